//! Fields: named data buffers bound to a discretization.

use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, IxDyn};
use std::sync::Arc;

use crate::discretization::{Discretization, Signature, StaggerLocation};
use crate::error::{RegridError, Result};

/// A data buffer living at one stagger location of a discretization.
///
/// The buffer shape always equals the discretization's location shape; data
/// is only exposed through views so the shape cannot change.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    discretization: Arc<Discretization>,
    location: StaggerLocation,
    data: ArrayD<f64>,
}

impl Field {
    /// Create a zero-filled field
    pub fn new(
        name: impl Into<String>,
        discretization: Arc<Discretization>,
        location: StaggerLocation,
    ) -> Self {
        let shape = discretization.location_shape(location);
        Self {
            name: name.into(),
            discretization,
            location,
            data: ArrayD::zeros(IxDyn(&shape)),
        }
    }

    /// Create a field from existing data, checking its shape
    pub fn from_array(
        name: impl Into<String>,
        discretization: Arc<Discretization>,
        location: StaggerLocation,
        data: ArrayD<f64>,
    ) -> Result<Self> {
        let name = name.into();
        let expected = discretization.location_shape(location);
        if data.shape() != expected.as_slice() {
            return Err(RegridError::incompatible(format!(
                "Field {} has shape {:?} but its {} {} location has shape {:?}",
                name,
                data.shape(),
                discretization.kind_name(),
                location,
                expected
            )));
        }
        // Standard layout keeps flat ids and memory order in step.
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        Ok(Self {
            name,
            discretization,
            location,
            data,
        })
    }

    /// Create a field from flat values in flat-id order
    pub fn from_vec(
        name: impl Into<String>,
        discretization: Arc<Discretization>,
        location: StaggerLocation,
        values: Vec<f64>,
    ) -> Result<Self> {
        let shape = discretization.location_shape(location);
        let data = ArrayD::from_shape_vec(IxDyn(&shape), values)?;
        Self::from_array(name, discretization, location, data)
    }

    /// Fill a field by evaluating `f` at every location point
    pub fn from_fn<F>(
        name: impl Into<String>,
        discretization: Arc<Discretization>,
        location: StaggerLocation,
        f: F,
    ) -> Result<Self>
    where
        F: Fn(f64, f64) -> f64,
    {
        let values = discretization
            .points(location)?
            .into_iter()
            .map(|p| f(p.x, p.y))
            .collect();
        Self::from_vec(name, discretization, location, values)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn discretization(&self) -> &Arc<Discretization> {
        &self.discretization
    }

    pub fn location(&self) -> StaggerLocation {
        self.location
    }

    pub fn data(&self) -> ArrayViewD<'_, f64> {
        self.data.view()
    }

    pub fn data_mut(&mut self) -> ArrayViewMutD<'_, f64> {
        self.data.view_mut()
    }

    /// Values in flat-id order
    pub fn as_slice(&self) -> &[f64] {
        self.data
            .as_slice()
            .expect("field data is kept in standard layout")
    }

    /// Mutable values in flat-id order
    pub fn as_slice_mut(&mut self) -> &mut [f64] {
        self.data
            .as_slice_mut()
            .expect("field data is kept in standard layout")
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Structural fingerprint of this field's discretization and location
    pub fn signature(&self) -> Signature {
        self.discretization.signature(self.location)
    }

    /// Check that the buffer still matches the discretization
    pub fn validate(&self) -> Result<()> {
        let expected = self.discretization.location_shape(self.location);
        if self.data.shape() != expected.as_slice() {
            return Err(RegridError::incompatible(format!(
                "Field {} has shape {:?}, expected {:?}",
                self.name,
                self.data.shape(),
                expected
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::StructuredGrid;

    fn grid() -> Arc<Discretization> {
        Arc::new(StructuredGrid::global(4, 2).unwrap().into())
    }

    #[test]
    fn test_new_field_is_zeroed() {
        let field = Field::new("t", grid(), StaggerLocation::Center);
        assert_eq!(field.data().shape(), &[2, 4]);
        assert!(field.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let result = Field::from_vec("t", grid(), StaggerLocation::Center, vec![0.0; 9]);
        assert!(result.is_err());

        let result = Field::from_array(
            "t",
            grid(),
            StaggerLocation::Corner,
            ArrayD::zeros(IxDyn(&[2, 4])),
        );
        assert!(matches!(
            result,
            Err(RegridError::IncompatibleDiscretization { .. })
        ));
    }

    #[test]
    fn test_from_fn_uses_location_points() {
        let field = Field::from_fn("lon", grid(), StaggerLocation::Center, |lon, _| lon).unwrap();
        assert_eq!(field.as_slice()[..4], [45.0, 135.0, 225.0, 315.0]);
    }

    #[test]
    fn test_transposed_input_is_standardized() {
        let data = ndarray::Array2::from_shape_fn((4, 2), |(i, j)| (j * 4 + i) as f64)
            .reversed_axes()
            .into_dyn();
        let field = Field::from_array("t", grid(), StaggerLocation::Center, data).unwrap();
        assert_eq!(field.as_slice(), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }
}
