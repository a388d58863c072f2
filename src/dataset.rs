//! Training/test datasets: fixed-width rows of input/output vectors with
//! shuffling, merging, subsetting, and scaling (§6).

use crate::scalar::Scalar;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{DataError, DataResult};

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainingData<T: Scalar> {
    inputs: Vec<Vec<T>>,
    outputs: Vec<Vec<T>>,
}

impl<T: Scalar> TrainingData<T> {
    /// Build a dataset from parallel input/output rows. Every row must have
    /// the same input width and the same output width.
    pub fn create_train(inputs: Vec<Vec<T>>, outputs: Vec<Vec<T>>) -> DataResult<Self> {
        if inputs.is_empty() || outputs.is_empty() {
            return Err(DataError::Empty);
        }
        if inputs.len() != outputs.len() {
            return Err(DataError::ShapeMismatch(
                format!("{} input rows", inputs.len()),
                format!("{} output rows", outputs.len()),
            ));
        }
        let in_width = inputs[0].len();
        let out_width = outputs[0].len();
        if inputs.iter().any(|r| r.len() != in_width) || outputs.iter().any(|r| r.len() != out_width) {
            return Err(DataError::ShapeMismatch(
                "ragged input row".into(),
                "ragged output row".into(),
            ));
        }
        Ok(TrainingData { inputs, outputs })
    }

    /// Build a dataset by sampling `count` rows from a callback, as FANN's
    /// `fann_create_train_from_callback` does for synthetic/generated data.
    pub fn create_train_from_callback(
        count: usize,
        num_input: usize,
        num_output: usize,
        mut gen: impl FnMut(usize) -> (Vec<T>, Vec<T>),
    ) -> DataResult<Self> {
        let mut inputs = Vec::with_capacity(count);
        let mut outputs = Vec::with_capacity(count);
        for i in 0..count {
            let (inp, out) = gen(i);
            if inp.len() != num_input || out.len() != num_output {
                return Err(DataError::ShapeMismatch(
                    format!("row {i} has {} inputs", inp.len()),
                    format!("expected {num_input}"),
                ));
            }
            inputs.push(inp);
            outputs.push(out);
        }
        Self::create_train(inputs, outputs)
    }

    pub fn length(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn num_input(&self) -> usize {
        self.inputs.first().map_or(0, |r| r.len())
    }

    pub fn num_output(&self) -> usize {
        self.outputs.first().map_or(0, |r| r.len())
    }

    pub fn input(&self, i: usize) -> DataResult<&[T]> {
        self.inputs
            .get(i)
            .map(|v| v.as_slice())
            .ok_or(DataError::IndexOutOfRange { index: i, len: self.inputs.len() })
    }

    pub fn output(&self, i: usize) -> DataResult<&[T]> {
        self.outputs
            .get(i)
            .map(|v| v.as_slice())
            .ok_or(DataError::IndexOutOfRange { index: i, len: self.outputs.len() })
    }

    pub fn inputs(&self) -> &[Vec<T>] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Vec<T>] {
        &self.outputs
    }

    pub fn shuffle(&mut self, rng: &mut impl Rng) {
        let mut order: Vec<usize> = (0..self.inputs.len()).collect();
        order.shuffle(rng);
        self.inputs = order.iter().map(|&i| self.inputs[i].clone()).collect();
        self.outputs = order.iter().map(|&i| self.outputs[i].clone()).collect();
    }

    /// Concatenate another dataset of the same shape onto this one.
    pub fn merge(&mut self, other: &TrainingData<T>) -> DataResult<()> {
        if !self.is_empty()
            && (self.num_input() != other.num_input() || self.num_output() != other.num_output())
        {
            return Err(DataError::ShapeMismatch(
                format!("{}/{}", self.num_input(), self.num_output()),
                format!("{}/{}", other.num_input(), other.num_output()),
            ));
        }
        self.inputs.extend(other.inputs.iter().cloned());
        self.outputs.extend(other.outputs.iter().cloned());
        Ok(())
    }

    /// Return a new dataset covering rows `[pos, pos+len)`.
    pub fn subset(&self, pos: usize, len: usize) -> DataResult<Self> {
        if pos + len > self.inputs.len() {
            return Err(DataError::SubsetOutOfRange { pos, len });
        }
        Ok(TrainingData {
            inputs: self.inputs[pos..pos + len].to_vec(),
            outputs: self.outputs[pos..pos + len].to_vec(),
        })
    }

    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Scale every input column into `[new_min, new_max]` given the
    /// dataset's own observed min/max per column.
    pub fn scale_input(&mut self, new_min: T, new_max: T) {
        scale_columns(&mut self.inputs, new_min, new_max);
    }

    pub fn scale_output(&mut self, new_min: T, new_max: T) {
        scale_columns(&mut self.outputs, new_min, new_max);
    }

    pub fn scale(&mut self, new_min: T, new_max: T) {
        self.scale_input(new_min, new_max);
        self.scale_output(new_min, new_max);
    }
}

fn scale_columns<T: Scalar>(rows: &mut [Vec<T>], new_min: T, new_max: T) {
    if rows.is_empty() {
        return;
    }
    let width = rows[0].len();
    for col in 0..width {
        let mut lo = rows[0][col];
        let mut hi = rows[0][col];
        for row in rows.iter() {
            if row[col] < lo {
                lo = row[col];
            }
            if row[col] > hi {
                hi = row[col];
            }
        }
        let span = hi - lo;
        if span <= T::zero() {
            continue;
        }
        for row in rows.iter_mut() {
            row[col] = (row[col] - lo) / span * (new_max - new_min) + new_min;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xor_data() -> TrainingData<f64> {
        TrainingData::create_train(
            vec![vec![-1.0, -1.0], vec![-1.0, 1.0], vec![1.0, -1.0], vec![1.0, 1.0]],
            vec![vec![-1.0], vec![1.0], vec![1.0], vec![-1.0]],
        )
        .unwrap()
    }

    #[test]
    fn create_train_rejects_ragged_rows() {
        let err = TrainingData::create_train(
            vec![vec![0.0, 0.0], vec![0.0]],
            vec![vec![0.0], vec![0.0]],
        )
        .unwrap_err();
        assert!(matches!(err, DataError::ShapeMismatch(_, _)));
    }

    #[test]
    fn subset_out_of_range_is_reported() {
        let data = xor_data();
        assert!(data.subset(2, 10).is_err());
        let sub = data.subset(1, 2).unwrap();
        assert_eq!(sub.length(), 2);
    }

    #[test]
    fn merge_concatenates_rows() {
        let mut a = xor_data();
        let b = xor_data();
        a.merge(&b).unwrap();
        assert_eq!(a.length(), 8);
    }

    #[test]
    fn shuffle_preserves_input_output_pairing() {
        let mut data = xor_data();
        let mut rng = rand::thread_rng();
        data.shuffle(&mut rng);
        for i in 0..data.length() {
            let input = data.input(i).unwrap();
            let output = data.output(i).unwrap();
            // XOR invariant still holds after shuffling rows together.
            let expect = if (input[0] > 0.0) != (input[1] > 0.0) { 1.0 } else { -1.0 };
            assert_eq!(output[0], expect);
        }
    }
}
