//! Regrid options and their defaults.
//!
//! Every optional argument of a store call is a named field of
//! [`RegridOptions`]; defaults are BILINEAR / DSTAREA / ERROR and options are
//! validated eagerly before any geometry is touched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{RegridError, Result};

/// Interpolation method used to generate weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegridMethod {
    /// Bilinear interpolation inside the containing source cell
    #[default]
    Bilinear,
    /// Quadratic patch recovery over a neighbourhood of source points
    Patch,
    /// First-order conservative (area-weighted) remapping
    Conserve,
    /// Each destination takes the value of its nearest source
    NearestStod,
    /// Each source is sent to its nearest destination
    NearestDtos,
}

impl RegridMethod {
    /// All methods, in declaration order
    pub const ALL: [RegridMethod; 5] = [
        RegridMethod::Bilinear,
        RegridMethod::Patch,
        RegridMethod::Conserve,
        RegridMethod::NearestStod,
        RegridMethod::NearestDtos,
    ];

    /// Get the canonical name of this method
    pub fn name(&self) -> &'static str {
        match self {
            RegridMethod::Bilinear => "bilinear",
            RegridMethod::Patch => "patch",
            RegridMethod::Conserve => "conserve",
            RegridMethod::NearestStod => "nearest_stod",
            RegridMethod::NearestDtos => "nearest_dtos",
        }
    }
}

impl fmt::Display for RegridMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RegridMethod {
    type Err = RegridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bilinear" => Ok(RegridMethod::Bilinear),
            "patch" => Ok(RegridMethod::Patch),
            "conserve" | "conservative" => Ok(RegridMethod::Conserve),
            "nearest_stod" | "nearest" => Ok(RegridMethod::NearestStod),
            "nearest_dtos" => Ok(RegridMethod::NearestDtos),
            _ => Err(RegridError::invalid_config(format!(
                "Unknown regrid method: {}",
                s
            ))),
        }
    }
}

/// Artificial pole construction for source grids that stop short of a pole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoleMethod {
    /// No pole; destinations beyond the last source row are unmapped
    None,
    /// Pole value is the average of every point on the pole ring
    #[serde(rename = "allavg")]
    AllAvg,
    /// Pole value is the average of the N ring points nearest the destination
    #[serde(rename = "npntavg")]
    NpntAvg,
    /// The hole is closed with degenerate triangles, no pole value
    Teeth,
}

impl PoleMethod {
    /// Get the canonical name of this pole method
    pub fn name(&self) -> &'static str {
        match self {
            PoleMethod::None => "none",
            PoleMethod::AllAvg => "allavg",
            PoleMethod::NpntAvg => "npntavg",
            PoleMethod::Teeth => "teeth",
        }
    }
}

impl fmt::Display for PoleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PoleMethod {
    type Err = RegridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(PoleMethod::None),
            "allavg" => Ok(PoleMethod::AllAvg),
            "npntavg" => Ok(PoleMethod::NpntAvg),
            "teeth" => Ok(PoleMethod::Teeth),
            _ => Err(RegridError::invalid_config(format!(
                "Unknown pole method: {}",
                s
            ))),
        }
    }
}

/// Normalization used for conservative weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormType {
    /// Divide the overlap area by the destination cell area
    #[default]
    #[serde(rename = "dstarea")]
    DstArea,
    /// Divide the overlap area by the unmasked covered area of the destination
    #[serde(rename = "fracarea")]
    FracArea,
}

impl NormType {
    /// Get the canonical name of this normalization
    pub fn name(&self) -> &'static str {
        match self {
            NormType::DstArea => "dstarea",
            NormType::FracArea => "fracarea",
        }
    }
}

impl fmt::Display for NormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NormType {
    type Err = RegridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "dstarea" => Ok(NormType::DstArea),
            "fracarea" => Ok(NormType::FracArea),
            _ => Err(RegridError::invalid_config(format!(
                "Unknown norm type: {}",
                s
            ))),
        }
    }
}

/// What to do with destinations that receive no source contribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedAction {
    /// Fail the store call
    #[default]
    Error,
    /// Leave the destination row empty
    Ignore,
}

impl FromStr for UnmappedAction {
    type Err = RegridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "error" => Ok(UnmappedAction::Error),
            "ignore" => Ok(UnmappedAction::Ignore),
            _ => Err(RegridError::invalid_config(format!(
                "Unknown unmapped action: {}",
                s
            ))),
        }
    }
}

/// Which part of the destination is zeroed before weights are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroRegion {
    /// The whole destination buffer
    #[default]
    Total,
    /// Only destinations that appear in the weight matrix
    Select,
    /// Nothing
    Empty,
}

impl FromStr for ZeroRegion {
    type Err = RegridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "total" => Ok(ZeroRegion::Total),
            "select" => Ok(ZeroRegion::Select),
            "empty" => Ok(ZeroRegion::Empty),
            _ => Err(RegridError::invalid_config(format!(
                "Unknown zero region: {}",
                s
            ))),
        }
    }
}

/// A set of integer mask codes.
///
/// A location is excluded from regridding when its mask value is a member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaskSet {
    values: BTreeSet<i32>,
}

impl MaskSet {
    /// Create a mask set from integer codes
    pub fn new(values: impl IntoIterator<Item = i32>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// Create a mask set from floating-point codes.
    ///
    /// Values are truncated toward zero; NaN becomes 0 and values outside the
    /// `i32` range saturate.
    pub fn from_floats(values: &[f64]) -> Self {
        Self::new(values.iter().map(|&v| v as i32))
    }

    /// Whether the given mask value is excluded
    pub fn contains(&self, value: i32) -> bool {
        self.values.contains(&value)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the codes in ascending order
    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.values.iter().copied()
    }
}

/// Options for a store call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegridOptions {
    /// Mask codes excluding source locations
    #[serde(default)]
    pub src_mask_values: Option<MaskSet>,

    /// Mask codes excluding destination locations
    #[serde(default)]
    pub dst_mask_values: Option<MaskSet>,

    /// Weight generation method
    #[serde(default)]
    pub regrid_method: RegridMethod,

    /// Pole treatment (None = method default)
    #[serde(default)]
    pub pole_method: Option<PoleMethod>,

    /// Ring points averaged by [`PoleMethod::NpntAvg`]
    #[serde(default)]
    pub regrid_pole_npoints: Option<usize>,

    /// Conservative normalization
    #[serde(default)]
    pub norm_type: NormType,

    /// Policy for destinations without source contribution
    #[serde(default)]
    pub unmapped_action: UnmappedAction,

    /// Skip degenerate cells instead of failing
    #[serde(default)]
    pub ignore_degenerate: bool,
}

impl RegridOptions {
    /// Options for the given method with every other field defaulted
    pub fn new(regrid_method: RegridMethod) -> Self {
        Self {
            regrid_method,
            ..Default::default()
        }
    }

    pub fn with_src_mask(mut self, values: impl IntoIterator<Item = i32>) -> Self {
        self.src_mask_values = Some(MaskSet::new(values));
        self
    }

    pub fn with_dst_mask(mut self, values: impl IntoIterator<Item = i32>) -> Self {
        self.dst_mask_values = Some(MaskSet::new(values));
        self
    }

    pub fn with_pole(mut self, pole_method: PoleMethod, npoints: Option<usize>) -> Self {
        self.pole_method = Some(pole_method);
        self.regrid_pole_npoints = npoints;
        self
    }

    pub fn with_norm_type(mut self, norm_type: NormType) -> Self {
        self.norm_type = norm_type;
        self
    }

    pub fn with_unmapped_action(mut self, unmapped_action: UnmappedAction) -> Self {
        self.unmapped_action = unmapped_action;
        self
    }

    pub fn with_ignore_degenerate(mut self, ignore_degenerate: bool) -> Self {
        self.ignore_degenerate = ignore_degenerate;
        self
    }

    /// The pole method actually used: NONE for CONSERVE, ALLAVG otherwise
    pub fn effective_pole_method(&self) -> PoleMethod {
        match self.pole_method {
            Some(pole) => pole,
            None if self.regrid_method == RegridMethod::Conserve => PoleMethod::None,
            None => PoleMethod::AllAvg,
        }
    }

    /// Validate the option combination
    pub fn validate(&self) -> Result<()> {
        let pole = self.effective_pole_method();

        if self.regrid_method == RegridMethod::Conserve && pole != PoleMethod::None {
            return Err(RegridError::invalid_config(format!(
                "Pole method {} cannot be combined with conservative regridding",
                pole
            )));
        }

        if pole == PoleMethod::NpntAvg {
            match self.regrid_pole_npoints {
                None => {
                    return Err(RegridError::invalid_config(
                        "Pole method npntavg requires regrid_pole_npoints",
                    ))
                }
                Some(0) => {
                    return Err(RegridError::invalid_config(
                        "regrid_pole_npoints must be at least 1",
                    ))
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    /// Whether a source mask value is excluded
    pub fn src_masked(&self, value: i32) -> bool {
        self.src_mask_values
            .as_ref()
            .is_some_and(|mask| mask.contains(value))
    }

    /// Whether a destination mask value is excluded
    pub fn dst_masked(&self, value: i32) -> bool {
        self.dst_mask_values
            .as_ref()
            .is_some_and(|mask| mask.contains(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RegridOptions::default();
        assert_eq!(options.regrid_method, RegridMethod::Bilinear);
        assert_eq!(options.norm_type, NormType::DstArea);
        assert_eq!(options.unmapped_action, UnmappedAction::Error);
        assert!(!options.ignore_degenerate);
        assert_eq!(options.effective_pole_method(), PoleMethod::AllAvg);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_conserve_pole_default_and_conflict() {
        let options = RegridOptions::new(RegridMethod::Conserve);
        assert_eq!(options.effective_pole_method(), PoleMethod::None);
        assert!(options.validate().is_ok());

        let options = options.with_pole(PoleMethod::AllAvg, None);
        assert!(matches!(
            options.validate(),
            Err(RegridError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_npntavg_requires_points() {
        let options = RegridOptions::default().with_pole(PoleMethod::NpntAvg, None);
        assert!(options.validate().is_err());

        let options = RegridOptions::default().with_pole(PoleMethod::NpntAvg, Some(0));
        assert!(options.validate().is_err());

        let options = RegridOptions::default().with_pole(PoleMethod::NpntAvg, Some(4));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_mask_truncates_toward_zero() {
        let mask = MaskSet::from_floats(&[1.9, -1.9, 2.0, f64::NAN]);
        assert!(mask.contains(1));
        assert!(mask.contains(-1));
        assert!(mask.contains(2));
        assert!(mask.contains(0));
        assert!(!mask.contains(-2));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!(
            "BILINEAR".parse::<RegridMethod>().unwrap(),
            RegridMethod::Bilinear
        );
        assert_eq!(
            "nearest_dtos".parse::<RegridMethod>().unwrap(),
            RegridMethod::NearestDtos
        );
        assert!("bicubic".parse::<RegridMethod>().is_err());
        assert_eq!("teeth".parse::<PoleMethod>().unwrap(), PoleMethod::Teeth);
        assert_eq!("fracarea".parse::<NormType>().unwrap(), NormType::FracArea);
        assert_eq!("select".parse::<ZeroRegion>().unwrap(), ZeroRegion::Select);
    }

    #[test]
    fn test_options_json_roundtrip_names() {
        let json = r#"{
            "regrid_method": "conserve",
            "norm_type": "fracarea",
            "unmapped_action": "ignore",
            "src_mask_values": [0, 2]
        }"#;
        let options: RegridOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.regrid_method, RegridMethod::Conserve);
        assert_eq!(options.norm_type, NormType::FracArea);
        assert_eq!(options.unmapped_action, UnmappedAction::Ignore);
        assert!(options.src_masked(2));
        assert!(!options.src_masked(1));
    }
}
