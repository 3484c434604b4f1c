use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::{MlErr, Result};

/// The amount of feature channels of an edge, `(r, phi, z)` for each of its two hits.
pub const EDGE_CHANNELS: usize = 6;

/// The physical `[min, max]` range of a feature channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelRange {
    pub min: f64,
    pub max: f64,
}

impl ChannelRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// Rescales raw geometric edge features onto `[0, 1]`.
///
/// The mapped values are fed to the circuit as rotation angles as they are. Raw values
/// outside of their channel's range are mapped linearly outside of `[0, 1]` as well, it's up
/// to the caller to clip them beforehand if that matters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureMapper {
    channels: [ChannelRange; EDGE_CHANNELS],
}

impl Default for FeatureMapper {
    /// The detector geometry the hit graphs are normalized to.
    fn default() -> Self {
        const R: ChannelRange = ChannelRange::new(0., 1.);
        const PHI: ChannelRange = ChannelRange::new(-1., 1.);
        const Z: ChannelRange = ChannelRange::new(0., 1.2);

        Self {
            channels: [R, PHI, Z, R, PHI, Z],
        }
    }
}

impl FeatureMapper {
    /// Creates a new `FeatureMapper`.
    ///
    /// # Arguments
    /// * `channels` - The range of each of the six channels.
    ///
    /// # Returns
    /// A new `FeatureMapper` or an `MlErr::InvalidConfig` if any range is empty or not finite.
    pub fn new(channels: [ChannelRange; EDGE_CHANNELS]) -> Result<Self> {
        for (i, ChannelRange { min, max }) in channels.iter().enumerate() {
            if !(min.is_finite() && max.is_finite() && min < max) {
                return Err(MlErr::InvalidConfig(format!(
                    "feature channel {i} has an invalid range [{min}, {max}]"
                )));
            }
        }

        Ok(Self { channels })
    }

    /// Creates a `FeatureMapper` that uses the same hit ranges for both endpoints of an edge.
    pub fn from_hit_ranges(r: ChannelRange, phi: ChannelRange, z: ChannelRange) -> Result<Self> {
        Self::new([r, phi, z, r, phi, z])
    }

    /// Maps a batch of raw edge features, one edge per row.
    ///
    /// # Arguments
    /// * `raw` - The raw features, with exactly six columns.
    ///
    /// # Returns
    /// A new array with the same shape and row order as `raw`, or an `MlErr::SizeMismatch`
    /// if `raw` doesn't have six columns.
    pub fn map(&self, raw: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if raw.ncols() != EDGE_CHANNELS {
            return Err(MlErr::SizeMismatch {
                what: "feature channels",
                got: raw.ncols(),
                expected: EDGE_CHANNELS,
            });
        }

        let mut mapped = raw.to_owned();

        for (mut column, ChannelRange { min, max }) in
            mapped.columns_mut().into_iter().zip(self.channels)
        {
            column.mapv_inplace(|x| (x - min) / (max - min));
        }

        Ok(mapped)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn default_ranges_map_onto_unit_interval() {
        let mapper = FeatureMapper::default();
        let raw = array![
            [0., -1., 0., 1., 1., 1.2],
            [0.5, 0., 0.6, 0.25, -0.5, 0.3],
        ];

        let mapped = mapper.map(raw.view()).unwrap();
        let expected = array![[0., 0., 0., 1., 1., 1.], [0.5, 0.5, 0.5, 0.25, 0.25, 0.25]];

        assert_eq!(mapped.shape(), raw.shape());
        mapped
            .iter()
            .zip(expected.iter())
            .for_each(|(a, b)| assert!((a - b).abs() < TOL, "{a} != {b}"));
    }

    #[test]
    fn out_of_range_values_are_not_clipped() {
        let mapper = FeatureMapper::default();
        let raw = array![[2., 0., 0., 0., 0., 0.]];

        let mapped = mapper.map(raw.view()).unwrap();
        assert_eq!(mapped[[0, 0]], 2.);
    }

    #[test]
    fn empty_batch_stays_empty() {
        let mapper = FeatureMapper::default();
        let raw = Array2::<f64>::zeros((0, EDGE_CHANNELS));

        assert_eq!(mapper.map(raw.view()).unwrap().nrows(), 0);
    }

    #[test]
    fn rejects_wrong_width() {
        let mapper = FeatureMapper::default();
        let raw = Array2::<f64>::zeros((2, 4));

        assert!(matches!(
            mapper.map(raw.view()),
            Err(MlErr::SizeMismatch { got: 4, .. })
        ));
    }

    #[test]
    fn rejects_empty_range() {
        let r = ChannelRange::new(1., 1.);
        let ok = ChannelRange::new(0., 1.);

        assert!(FeatureMapper::from_hit_ranges(ok, r, ok).is_err());
    }
}
