use std::sync::Arc;

use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::{
    encoder::{decode_output, encode_input},
    error::PredictError,
    record::RawRecord,
    trainer::TrainedModel,
};

/// The live model shared between a pipeline and its prediction service.
///
/// Installing a model takes the write lock, inference holds the read lock for its whole
/// duration, so a prediction never straddles a model swap.
#[derive(Debug, Default, Clone)]
pub struct ModelSlot {
    model: Arc<RwLock<Option<Arc<TrainedModel>>>>,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(model: TrainedModel) -> Self {
        let slot = Self::new();
        slot.install(model);
        slot
    }

    /// Replaces the live model.
    pub fn install(&self, model: TrainedModel) -> Arc<TrainedModel> {
        let model = Arc::new(model);
        *self.model.write() = Some(model.clone());
        info!("installed a new model");
        model
    }

    pub fn get(&self) -> Option<Arc<TrainedModel>> {
        self.model.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.model.read().is_some()
    }

    fn run<T>(&self, f: impl FnOnce(Option<&TrainedModel>) -> T) -> T {
        let guard = self.model.read();
        f(guard.as_deref())
    }
}

/// One prediction to make.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    pub record: RawRecord,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub actual_price: Option<f64>,
}

impl PredictionRequest {
    pub fn new(record: RawRecord) -> Self {
        Self {
            record,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub predicted_value: f64,
}

/// An entry of the comparison log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub label: String,
    pub actual_price: Option<f64>,
    pub predicted_price: f64,
}

/// Predicts the price of `record` with `model`.
///
/// # Returns
/// `PredictError::NoModel` when there's no model, `PredictError::EncodeError` when the record
/// can't be encoded.
pub fn predict(model: Option<&TrainedModel>, record: &RawRecord) -> Result<f64, PredictError> {
    let model = model.ok_or(PredictError::NoModel)?;
    let input = encode_input(record)?;
    let output = model.run(&input)?;

    Ok(decode_output(output))
}

/// Serves predictions out of a `ModelSlot` and keeps the comparison log.
///
/// The log is append-only and unbounded.
#[derive(Debug, Default)]
pub struct PredictionService {
    slot: ModelSlot,
    log: Mutex<Vec<PredictionRecord>>,
}

impl PredictionService {
    pub fn new(slot: ModelSlot) -> Self {
        Self {
            slot,
            log: Mutex::default(),
        }
    }

    pub fn slot(&self) -> &ModelSlot {
        &self.slot
    }

    /// Predicts the price of the request's record. Only successful predictions are logged.
    pub fn predict(&self, request: PredictionRequest) -> Result<Prediction, PredictError> {
        let predicted_value = self.slot.run(|model| predict(model, &request.record))?;

        let mut log = self.log.lock();
        let label = request
            .label
            .unwrap_or_else(|| format!("Prediction {}", log.len() + 1));

        debug!("{label}: predicted {predicted_value}");

        log.push(PredictionRecord {
            label,
            actual_price: request.actual_price,
            predicted_price: predicted_value,
        });

        Ok(Prediction { predicted_value })
    }

    /// A snapshot of the comparison log, oldest first.
    pub fn log(&self) -> Vec<PredictionRecord> {
        self.log.lock().clone()
    }

    pub fn log_len(&self) -> usize {
        self.log.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::{
        dataset::DatasetBuilder,
        error::EncodeError,
        trainer::{self, TrainerConfig},
    };

    fn house(sqft: &str, size: &str, price: &str) -> RawRecord {
        RawRecord::new()
            .with("total_sqft", sqft)
            .with("size", size)
            .with("bath", "2")
            .with("balcony", "1")
            .with("price", price)
            .with("age", "10")
    }

    fn model() -> TrainedModel {
        let records = [
            house("1000", "2 BHK", "50"),
            house("2000", "3 BHK", "90"),
            house("3000", "4 BHK", "150"),
        ];
        let config = TrainerConfig {
            max_iterations: 50,
            seed: Some(3),
            ..Default::default()
        };

        trainer::train(&DatasetBuilder.build(&records).examples, config).unwrap()
    }

    #[test]
    fn no_model_is_an_error() {
        let service = PredictionService::default();
        let result = service.predict(PredictionRequest::new(house("1000", "2 BHK", "50")));

        assert_eq!(result, Err(PredictError::NoModel));
        assert_eq!(service.log_len(), 0);
    }

    #[test]
    fn bad_records_surface_and_are_not_logged() {
        let service = PredictionService::new(ModelSlot::with_model(model()));
        let result = service.predict(PredictionRequest::new(house("abc", "2 BHK", "50")));

        assert!(matches!(
            result,
            Err(PredictError::EncodeError(EncodeError::NotANumber { .. }))
        ));
        assert!(service.log().is_empty());
    }

    #[test]
    fn predictions_are_decoded_and_logged() {
        let model = model();
        let service = PredictionService::new(ModelSlot::with_model(model.clone()));
        let record = house("1500", "3 BHK", "");

        let prediction = service.predict(PredictionRequest::new(record.clone())).unwrap();
        let expected = decode_output(model.run(&encode_input(&record).unwrap()).unwrap());
        assert_eq!(prediction.predicted_value, expected);

        service
            .predict(PredictionRequest {
                record,
                label: Some("Pune flat".into()),
                actual_price: Some(75.),
            })
            .unwrap();

        let log = service.log();
        assert_eq!(log[0].label, "Prediction 1");
        assert_eq!(log[0].actual_price, None);
        assert_eq!(log[1].label, "Pune flat");
        assert_eq!(log[1].actual_price, Some(75.));
        assert_eq!(log[1].predicted_price, expected);
    }

    #[test]
    fn concurrent_predictions_match_sequential_ones() {
        let service = PredictionService::new(ModelSlot::with_model(model()));
        let records: Vec<_> = (1..=8)
            .map(|i| house(&(i * 400).to_string(), &format!("{} BHK", i % 5), ""))
            .collect();

        let sequential: Vec<f64> = records
            .iter()
            .map(|r| predict(service.slot().get().as_deref(), r).unwrap())
            .collect();

        let concurrent: Vec<f64> = thread::scope(|s| {
            let handles: Vec<_> = records
                .iter()
                .map(|r| {
                    let service = &service;
                    s.spawn(move || {
                        service
                            .predict(PredictionRequest::new(r.clone()))
                            .unwrap()
                            .predicted_value
                    })
                })
                .collect();

            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(sequential, concurrent);
        assert_eq!(service.log_len(), 8);
    }

    #[test]
    fn installing_replaces_the_live_model() {
        let slot = ModelSlot::new();
        let service = PredictionService::new(slot.clone());
        assert!(!service.slot().is_loaded());

        slot.install(model());
        assert!(service.slot().is_loaded());
        assert!(service.predict(PredictionRequest::new(house("900", "1 RK", ""))).is_ok());
    }

    #[test]
    fn response_uses_camel_case() {
        let json = serde_json::to_value(Prediction { predicted_value: 2.5 }).unwrap();
        assert_eq!(json, serde_json::json!({ "predictedValue": 2.5 }));
    }
}
