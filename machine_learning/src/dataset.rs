use std::num::NonZeroUsize;

use ndarray::{ArrayView2, s};

use crate::{MlErr, Result};

/// An in-memory supervised dataset stored as consecutive `x ++ y` rows.
#[derive(Debug, Clone)]
pub struct Dataset {
    x_size: usize,
    y_size: usize,
    len: usize,
    data: Vec<f32>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `data` - The samples, each one being `x_size` inputs followed by `y_size` outputs.
    /// * `x_size` - The amount of inputs per sample.
    /// * `y_size` - The amount of outputs per sample.
    ///
    /// # Returns
    /// A new `Dataset` or an error if `data` doesn't hold a whole number of rows.
    pub fn new(data: Vec<f32>, x_size: usize, y_size: usize) -> Result<Self> {
        let row_size = x_size + y_size;

        if row_size == 0 || data.len() % row_size != 0 {
            return Err(MlErr::SizeMismatch {
                what: "dataset rows",
                got: data.len(),
                expected: row_size,
            });
        }

        Ok(Self {
            x_size,
            y_size,
            len: data.len() / row_size,
            data,
        })
    }

    /// Builds a dataset out of `(x, y)` sample pairs.
    pub fn from_samples<'a, I>(samples: I, x_size: usize, y_size: usize) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a [f32], &'a [f32])>,
    {
        let mut data = Vec::new();

        for (x, y) in samples {
            if x.len() != x_size {
                return Err(MlErr::SizeMismatch {
                    what: "sample inputs",
                    got: x.len(),
                    expected: x_size,
                });
            }

            if y.len() != y_size {
                return Err(MlErr::SizeMismatch {
                    what: "sample outputs",
                    got: y.len(),
                    expected: y_size,
                });
            }

            data.extend_from_slice(x);
            data.extend_from_slice(y);
        }

        Self::new(data, x_size, y_size)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn x_size(&self) -> usize {
        self.x_size
    }

    pub fn y_size(&self) -> usize {
        self.y_size
    }

    /// Splits the dataset in consecutive batches of at most `batch_size` samples, in order.
    ///
    /// # Returns
    /// An iterator of `(x, y)` views.
    pub fn batches(
        &self,
        batch_size: NonZeroUsize,
    ) -> impl Iterator<Item = (ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        let row_size = self.x_size + self.y_size;
        let x_size = self.x_size;

        self.data
            .chunks(batch_size.get() * row_size)
            .filter_map(move |chunk| {
                let rows = chunk.len() / row_size;
                let view = ArrayView2::from_shape((rows, row_size), chunk).ok()?;
                Some((view.slice_move(s![.., ..x_size]), view.slice_move(s![.., x_size..])))
            })
    }
}
