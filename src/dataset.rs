use log::{info, warn};
use machine_learning::Dataset;
use serde::{Deserialize, Serialize};

use crate::{
    encoder::{self, HouseFeatures, INPUT_SIZE, OUTPUT_SIZE},
    error::EncodeError,
    normalize::NormalizationStats,
    record::RawRecord,
};

/// One encoded record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub input: [f32; INPUT_SIZE],
    pub output: [f32; OUTPUT_SIZE],
}

/// Raw-value ranges of the kept rows, one entry per encoded column. `None` while no row was kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub total_sqft: Option<NormalizationStats>,
    pub bedrooms: Option<NormalizationStats>,
    pub bath: Option<NormalizationStats>,
    pub balcony: Option<NormalizationStats>,
    pub age: Option<NormalizationStats>,
    pub price: Option<NormalizationStats>,
}

impl FeatureStats {
    fn include(&mut self, features: &HouseFeatures, price: f64) {
        let columns = [
            (&mut self.total_sqft, features.total_sqft),
            (&mut self.bedrooms, features.bedrooms as f64),
            (&mut self.bath, features.bath),
            (&mut self.balcony, features.balcony),
            (&mut self.age, features.age as f64),
            (&mut self.price, price),
        ];

        for (stats, value) in columns {
            match stats.as_mut() {
                Some(range) => range.include(value),
                None => *stats = Some(NormalizationStats { min: value, max: value }),
            }
        }
    }
}

/// The output of `DatasetBuilder::build`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuiltDataset {
    pub examples: Vec<TrainingExample>,
    pub stats: FeatureStats,
    pub dropped: usize,
}

impl BuiltDataset {
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Flattens the examples into the network's dataset layout.
    pub fn to_dataset(&self) -> machine_learning::Result<Dataset> {
        Dataset::from_samples(
            self.examples
                .iter()
                .map(|e| (e.input.as_slice(), e.output.as_slice())),
            INPUT_SIZE,
            OUTPUT_SIZE,
        )
    }

    /// Checks the invariants a deserialized dataset may have lost.
    pub fn validate(&self) -> Result<(), String> {
        let non_finite = self
            .examples
            .iter()
            .position(|e| e.input.iter().chain(&e.output).any(|v| !v.is_finite()));

        if let Some(i) = non_finite {
            return Err(format!("example {i} holds a non-finite value"));
        }

        if self.examples.is_empty() != self.stats.price.is_none() {
            return Err("column stats don't match the examples".into());
        }

        Ok(())
    }
}

/// Encodes whole record sets, dropping the rows that can't be encoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct DatasetBuilder;

impl DatasetBuilder {
    /// Builds the training set out of `records`.
    ///
    /// Never fails: a record that can't be encoded is logged and counted in `dropped`. The
    /// result may be empty, callers must check before training.
    pub fn build(&self, records: &[RawRecord]) -> BuiltDataset {
        let mut built = BuiltDataset::default();

        for (i, record) in records.iter().enumerate() {
            match encode(record) {
                Ok((features, price)) => {
                    built.stats.include(&features, price);
                    built.examples.push(TrainingExample {
                        input: features.to_input(),
                        output: encoder::scale_price(price),
                    });
                }
                Err(e) => {
                    warn!("dropping record {i}: {e}");
                    built.dropped += 1;
                }
            }
        }

        info!(
            "built {} training examples, dropped {} records",
            built.examples.len(),
            built.dropped
        );

        built
    }
}

fn encode(record: &RawRecord) -> Result<(HouseFeatures, f64), EncodeError> {
    let features = HouseFeatures::from_record(record)?;
    let price = encoder::price(record)?;
    Ok((features, price))
}
