use serde::{Deserialize, Serialize};

use crate::archive::reader::VariableArray;
use crate::error::{DatasetError, Result};

/// Per-value transform applied to every slot of a sample.
///
/// Axes count from the front when positive and from the back when negative,
/// so `-1` is the innermost axis of the sample.
///
/// In JSON: `"flatten"`, `{"threshold": {"low": 0.0, "high": 1.0}}`,
/// `{"roll": {"shift": 16, "axis": -3}}`, `{"compose": ["log10", "flatten"]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleTransform {
    #[default]
    Identity,
    /// Collapse to one dimension.
    Flatten,
    /// `log10` of every non-zero value; zeros stay zero.
    Log10,
    /// `log10` of every value, then scaled into `[0, 1]`.
    ///
    /// Without a range the sample's own minimum and maximum are used.
    LogNorm {
        #[serde(default)]
        range: Option<[f64; 2]>,
    },
    /// Clamp into `[low, high]`.
    Threshold { low: f64, high: f64 },
    ZScore { mean: f64, std: f64 },
    /// Cyclic shift along an axis.
    Roll {
        #[serde(default = "default_roll_shift")]
        shift: i64,
        #[serde(default = "default_roll_axis")]
        axis: i32,
    },
    /// Move axis `src` to position `dst`, keeping the order of the others.
    MoveAxis {
        #[serde(default = "default_last_axis")]
        src: i32,
        #[serde(default = "default_roll_axis")]
        dst: i32,
    },
    /// Sum over an axis, removing it.
    Sum {
        #[serde(default = "default_last_axis")]
        axis: i32,
    },
    /// Mean over an axis, removing it.
    Mean {
        #[serde(default = "default_last_axis")]
        axis: i32,
    },
    /// Apply in order.
    Compose(Vec<SampleTransform>),
}

fn default_roll_shift() -> i64 {
    16
}

fn default_roll_axis() -> i32 {
    -3
}

fn default_last_axis() -> i32 {
    -1
}

impl SampleTransform {
    /// Transform one sample. Fails with `Format` when an axis does not exist.
    pub fn apply(&self, mut array: VariableArray) -> Result<VariableArray> {
        match self {
            SampleTransform::Identity => Ok(array),
            SampleTransform::Flatten => Ok(VariableArray {
                shape: vec![array.data.len()],
                data: array.data,
            }),
            SampleTransform::Log10 => {
                for x in array.data.iter_mut().filter(|x| **x != 0.0) {
                    *x = x.log10();
                }
                Ok(array)
            }
            SampleTransform::LogNorm { range } => {
                for x in array.data.iter_mut() {
                    *x = x.log10();
                }
                let (low, high) = match range {
                    Some([low, high]) => (*low, *high),
                    None => {
                        let low = array.data.iter().copied().fold(f64::INFINITY, f64::min);
                        let high = array.data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                        (low, high)
                    }
                };
                for x in array.data.iter_mut() {
                    *x = (*x - low) / (high - low);
                }
                Ok(array)
            }
            SampleTransform::Threshold { low, high } => {
                for x in array.data.iter_mut() {
                    if *x < *low {
                        *x = *low;
                    } else if *x > *high {
                        *x = *high;
                    }
                }
                Ok(array)
            }
            SampleTransform::ZScore { mean, std } => {
                for x in array.data.iter_mut() {
                    *x = (*x - mean) / std;
                }
                Ok(array)
            }
            SampleTransform::Roll { shift, axis } => roll(array, *shift, *axis),
            SampleTransform::MoveAxis { src, dst } => move_axis(array, *src, *dst),
            SampleTransform::Sum { axis } => reduce(array, *axis, false),
            SampleTransform::Mean { axis } => reduce(array, *axis, true),
            SampleTransform::Compose(steps) => steps.iter().try_fold(array, |acc, step| step.apply(acc)),
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, SampleTransform::Identity)
    }
}

// ---------------------------------------------------------------------------
// Axis helpers (row-major data)
// ---------------------------------------------------------------------------

fn resolve_axis(axis: i32, ndim: usize) -> Result<usize> {
    let resolved = if axis < 0 { ndim as i64 + axis as i64 } else { axis as i64 };
    if resolved < 0 || resolved >= ndim as i64 {
        return Err(DatasetError::Format(format!(
            "axis {axis} is out of bounds for a {ndim}-dimensional sample"
        )));
    }
    Ok(resolved as usize)
}

/// `(outer, len, inner)` extents around `axis`.
fn split_at_axis(shape: &[usize], axis: usize) -> (usize, usize, usize) {
    let outer = shape[..axis].iter().product();
    let inner = shape[axis + 1..].iter().product();
    (outer, shape[axis], inner)
}

fn roll(array: VariableArray, shift: i64, axis: i32) -> Result<VariableArray> {
    let axis = resolve_axis(axis, array.shape.len())?;
    let (outer, len, inner) = split_at_axis(&array.shape, axis);
    if len == 0 {
        return Ok(array);
    }
    let shift = shift.rem_euclid(len as i64) as usize;
    let mut data = vec![0.0; array.data.len()];
    for o in 0..outer {
        for j in 0..len {
            let from = (o * len + j) * inner;
            let to = (o * len + (j + shift) % len) * inner;
            data[to..to + inner].copy_from_slice(&array.data[from..from + inner]);
        }
    }
    Ok(VariableArray {
        shape: array.shape,
        data,
    })
}

fn reduce(array: VariableArray, axis: i32, mean: bool) -> Result<VariableArray> {
    let axis = resolve_axis(axis, array.shape.len())?;
    let (outer, len, inner) = split_at_axis(&array.shape, axis);
    let mut data = vec![0.0; outer * inner];
    for o in 0..outer {
        for j in 0..len {
            let row = &array.data[(o * len + j) * inner..(o * len + j + 1) * inner];
            for (acc, x) in data[o * inner..(o + 1) * inner].iter_mut().zip(row) {
                *acc += x;
            }
        }
    }
    if mean {
        for x in data.iter_mut() {
            *x /= len as f64;
        }
    }
    let mut shape = array.shape;
    shape.remove(axis);
    Ok(VariableArray { shape, data })
}

fn move_axis(array: VariableArray, src: i32, dst: i32) -> Result<VariableArray> {
    let ndim = array.shape.len();
    let src = resolve_axis(src, ndim)?;
    let dst = resolve_axis(dst, ndim)?;
    if src == dst {
        return Ok(array);
    }

    // order[k] is the input axis that lands at output position k.
    let mut order: Vec<usize> = (0..ndim).filter(|&a| a != src).collect();
    order.insert(dst, src);

    let mut in_strides = vec![1usize; ndim];
    for a in (0..ndim.saturating_sub(1)).rev() {
        in_strides[a] = in_strides[a + 1] * array.shape[a + 1];
    }
    let shape: Vec<usize> = order.iter().map(|&a| array.shape[a]).collect();
    let strides: Vec<usize> = order.iter().map(|&a| in_strides[a]).collect();

    let mut data = Vec::with_capacity(array.data.len());
    let mut index = vec![0usize; ndim];
    for _ in 0..array.data.len() {
        let offset: usize = index.iter().zip(&strides).map(|(i, s)| i * s).sum();
        data.push(array.data[offset]);
        for k in (0..ndim).rev() {
            index[k] += 1;
            if index[k] < shape[k] {
                break;
            }
            index[k] = 0;
        }
    }
    Ok(VariableArray { shape, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> VariableArray {
        VariableArray::new(vec![2, 2], vec![0.0, 10.0, 100.0, 0.5]).unwrap()
    }

    /// Shape [2, 3, 4], values 0..24.
    fn cube() -> VariableArray {
        VariableArray::new(vec![2, 3, 4], (0..24).map(f64::from).collect()).unwrap()
    }

    #[test]
    fn test_log10_skips_zeros() {
        let out = SampleTransform::Log10.apply(grid()).unwrap();
        assert_eq!(out.shape, vec![2, 2]);
        assert_eq!(out.data[0], 0.0);
        assert_eq!(out.data[1], 1.0);
        assert_eq!(out.data[2], 2.0);
    }

    #[test]
    fn test_log_norm_own_range() {
        let sample = VariableArray::scalar(vec![1.0, 10.0, 100.0]);
        let out = SampleTransform::LogNorm { range: None }.apply(sample).unwrap();
        assert_eq!(out.data, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_log_norm_fixed_range() {
        let sample = VariableArray::scalar(vec![10.0, 1000.0]);
        let out = SampleTransform::LogNorm { range: Some([0.0, 4.0]) }.apply(sample).unwrap();
        assert_eq!(out.data, vec![0.25, 0.75]);
    }

    #[test]
    fn test_threshold_then_flatten() {
        let t = SampleTransform::Compose(vec![
            SampleTransform::Threshold { low: 1.0, high: 50.0 },
            SampleTransform::Flatten,
        ]);
        let out = t.apply(grid()).unwrap();
        assert_eq!(out.shape, vec![4]);
        assert_eq!(out.data, vec![1.0, 10.0, 50.0, 1.0]);
    }

    #[test]
    fn test_zscore() {
        let out = SampleTransform::ZScore { mean: 10.0, std: 2.0 }
            .apply(VariableArray::scalar(vec![14.0]))
            .unwrap();
        assert_eq!(out.data, vec![2.0]);
    }

    #[test]
    fn test_roll_middle_axis() {
        let out = SampleTransform::Roll { shift: 1, axis: 1 }.apply(cube()).unwrap();
        assert_eq!(out.shape, vec![2, 3, 4]);
        // Row 2 wraps round to row 0.
        assert_eq!(&out.data[0..4], &[8.0, 9.0, 10.0, 11.0]);
        assert_eq!(&out.data[4..8], &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(&out.data[12..16], &[20.0, 21.0, 22.0, 23.0]);
    }

    #[test]
    fn test_roll_negative_shift_and_axis() {
        let sample = VariableArray::scalar(vec![1.0, 2.0, 3.0, 4.0]);
        let out = SampleTransform::Roll { shift: -1, axis: -1 }.apply(sample).unwrap();
        assert_eq!(out.data, vec![2.0, 3.0, 4.0, 1.0]);
    }

    #[test]
    fn test_move_last_axis_to_front() {
        let out = SampleTransform::MoveAxis { src: -1, dst: 0 }.apply(cube()).unwrap();
        assert_eq!(out.shape, vec![4, 2, 3]);
        // out[k, i, j] == in[i, j, k]
        assert_eq!(&out.data[0..6], &[0.0, 4.0, 8.0, 12.0, 16.0, 20.0]);
        assert_eq!(out.data[6], 1.0);
        assert_eq!(out.data[23], 23.0);
    }

    #[test]
    fn test_move_axis_matches_transpose_for_2d() {
        let sample = VariableArray::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let out = SampleTransform::MoveAxis { src: 0, dst: 1 }.apply(sample).unwrap();
        assert_eq!(out.shape, vec![3, 2]);
        assert_eq!(out.data, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_sum_and_mean() {
        let sum = SampleTransform::Sum { axis: -1 }.apply(cube()).unwrap();
        assert_eq!(sum.shape, vec![2, 3]);
        assert_eq!(sum.data[0], 6.0);
        assert_eq!(sum.data[5], 20.0 + 21.0 + 22.0 + 23.0);

        let mean = SampleTransform::Mean { axis: 0 }.apply(cube()).unwrap();
        assert_eq!(mean.shape, vec![3, 4]);
        assert_eq!(mean.data[0], 6.0);
        assert_eq!(mean.data[11], 17.0);
    }

    #[test]
    fn test_axis_out_of_bounds() {
        let err = SampleTransform::Sum { axis: -3 }.apply(grid()).unwrap_err();
        assert!(matches!(err, DatasetError::Format(_)));
        assert!(SampleTransform::Roll { shift: 1, axis: 2 }.apply(grid()).is_err());
    }

    #[test]
    fn test_json_forms() {
        let t: SampleTransform =
            serde_json::from_str(r#"{"compose": ["log10", {"threshold": {"low": 0.0, "high": 1.0}}]}"#).unwrap();
        assert_eq!(
            t,
            SampleTransform::Compose(vec![
                SampleTransform::Log10,
                SampleTransform::Threshold { low: 0.0, high: 1.0 }
            ])
        );
        let plain: SampleTransform = serde_json::from_str(r#""identity""#).unwrap();
        assert!(plain.is_identity());
    }

    #[test]
    fn test_json_axis_defaults() {
        let t: SampleTransform = serde_json::from_str(r#"{"roll": {}}"#).unwrap();
        assert_eq!(t, SampleTransform::Roll { shift: 16, axis: -3 });
        let t: SampleTransform = serde_json::from_str(r#"{"move_axis": {}}"#).unwrap();
        assert_eq!(t, SampleTransform::MoveAxis { src: -1, dst: -3 });
        let t: SampleTransform = serde_json::from_str(r#"{"mean": {"axis": 0}}"#).unwrap();
        assert_eq!(t, SampleTransform::Mean { axis: 0 });
        let t: SampleTransform = serde_json::from_str(r#"{"log_norm": {"range": [1.0, 3.0]}}"#).unwrap();
        assert_eq!(t, SampleTransform::LogNorm { range: Some([1.0, 3.0]) });
    }
}
