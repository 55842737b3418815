//! Named filter presets.
//!
//! Deployed variants of this pipeline drifted apart in their tunables
//! (blur kernels, gain triples, grain strength). Each observed parameter
//! set lives here as a named preset instead of one guessed canonical
//! version; a stage set to `None` is skipped entirely.

use crate::cartoon::CartoonParams;
use crate::grade::GradeParams;
use crate::grain::GrainParams;
use crate::FilterError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub cartoon: Option<CartoonParams>,
    pub grade: Option<GradeParams>,
    pub grain: Option<GrainParams>,
}

impl Preset {
    /// The canonical parameter set: all three stages at their defaults.
    pub fn classic() -> Self {
        Self {
            name: "classic".into(),
            cartoon: Some(CartoonParams::default()),
            grade: Some(GradeParams::default()),
            grain: Some(GrainParams::default()),
        }
    }

    /// Heavier outlines, no grain, no grading — line-art look.
    pub fn sketch() -> Self {
        Self {
            name: "sketch".into(),
            cartoon: Some(CartoonParams {
                median_kernel: 5,
                threshold_offset: 0.0,
                ..CartoonParams::default()
            }),
            grade: None,
            grain: None,
        }
    }

    /// No outlines; washed-out grade with stronger grain.
    pub fn faded() -> Self {
        Self {
            name: "faded".into(),
            cartoon: None,
            grade: Some(GradeParams {
                saturation: 0.45,
                value: 1.1,
                ..GradeParams::default()
            }),
            grain: Some(GrainParams {
                intensity: 0.2,
                ..GrainParams::default()
            }),
        }
    }

    pub fn builtin() -> Vec<Preset> {
        vec![Self::classic(), Self::sketch(), Self::faded()]
    }

    pub fn by_name(name: &str) -> Result<Preset, FilterError> {
        Self::builtin()
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| FilterError::UnknownPreset(name.to_string()))
    }

    /// Stage names in application order, for status output.
    pub fn stage_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.cartoon.is_some() {
            names.push("cartoon");
        }
        if self.grade.is_some() {
            names.push("grade");
        }
        if self.grain.is_some() {
            names.push("grain");
        }
        names
    }
}
