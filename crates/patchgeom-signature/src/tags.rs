//! Canonical <-> TensorFlow constant-name translation.
//!
//! Both tables are index-paired: entry `i` of one side translates to entry
//! `i` of the other. Lookups take the first match, so a canonical name that
//! appears several times (`inputs`, `outputs`) always maps to its first
//! vendor constant. Unknown names pass through untouched.

use std::collections::BTreeSet;

/// Tag candidates in search order.
pub const MODEL_TAGS: [&str; 6] = ["serve", "inference", "train", "eval", "gpu", "tpu"];

pub const TF_MODEL_TAGS: [&str; 6] = [
    "tf.saved_model.tag_constants.SERVING",
    "tf.saved_model.tag_constants.INFERENCE",
    "tf.saved_model.tag_constants.TRAINING",
    "tf.saved_model.tag_constants.EVAL",
    "tf.saved_model.tag_constants.GPU",
    "tf.saved_model.tag_constants.TPU",
];

pub const DEFAULT_SERVING_SIGNATURE: &str = "serving_default";

pub const SIGNATURE_CONSTANTS: [&str; 15] = [
    "serving_default",
    "inputs",
    "tensorflow/serving/classify",
    "classes",
    "scores",
    "inputs",
    "tensorflow/serving/predict",
    "outputs",
    "inputs",
    "tensorflow/serving/regress",
    "outputs",
    "train",
    "eval",
    "tensorflow/supervised/training",
    "tensorflow/supervised/eval",
];

pub const TF_SIGNATURE_CONSTANTS: [&str; 15] = [
    "tf.saved_model.signature_constants.DEFAULT_SERVING_SIGNATURE_DEF_KEY",
    "tf.saved_model.signature_constants.CLASSIFY_INPUTS",
    "tf.saved_model.signature_constants.CLASSIFY_METHOD_NAME",
    "tf.saved_model.signature_constants.CLASSIFY_OUTPUT_CLASSES",
    "tf.saved_model.signature_constants.CLASSIFY_OUTPUT_SCORES",
    "tf.saved_model.signature_constants.PREDICT_INPUTS",
    "tf.saved_model.signature_constants.PREDICT_METHOD_NAME",
    "tf.saved_model.signature_constants.PREDICT_OUTPUTS",
    "tf.saved_model.signature_constants.REGRESS_INPUTS",
    "tf.saved_model.signature_constants.REGRESS_METHOD_NAME",
    "tf.saved_model.signature_constants.REGRESS_OUTPUTS",
    "tf.saved_model.signature_constants.DEFAULT_TRAIN_SIGNATURE_DEF_KEY",
    "tf.saved_model.signature_constants.DEFAULT_EVAL_SIGNATURE_DEF_KEY",
    "tf.saved_model.signature_constants.SUPERVISED_TRAIN_METHOD_NAME",
    "tf.saved_model.signature_constants.SUPERVISED_EVAL_METHOD_NAME",
];

fn translate<'a>(from: &[&str], to: &[&'a str], name: &'a str) -> &'a str {
    from.iter()
        .position(|candidate| *candidate == name)
        .map_or(name, |i| to[i])
}

pub fn tag_to_vendor(tag: &str) -> &str {
    translate(&MODEL_TAGS, &TF_MODEL_TAGS, tag)
}

pub fn tag_from_vendor(tag: &str) -> &str {
    translate(&TF_MODEL_TAGS, &MODEL_TAGS, tag)
}

pub fn signature_to_vendor(name: &str) -> &str {
    translate(&SIGNATURE_CONSTANTS, &TF_SIGNATURE_CONSTANTS, name)
}

pub fn signature_from_vendor(name: &str) -> &str {
    translate(&TF_SIGNATURE_CONSTANTS, &SIGNATURE_CONSTANTS, name)
}

/// Vendor names for a whole signature set, or the set unchanged unless
/// every member maps to exactly one vendor name. Every table row whose
/// canonical name is in the set counts, so a set holding `inputs` or
/// `outputs` (several rows each) comes back unchanged.
pub fn signatures_to_vendor(names: &[String]) -> Vec<String> {
    let distinct: BTreeSet<&str> = names.iter().map(String::as_str).collect();
    if !distinct.iter().all(|name| SIGNATURE_CONSTANTS.contains(name)) {
        return names.to_vec();
    }

    let translated: BTreeSet<&str> = SIGNATURE_CONSTANTS
        .iter()
        .zip(TF_SIGNATURE_CONSTANTS)
        .filter(|(canonical, _)| distinct.contains(*canonical))
        .map(|(_, vendor)| vendor)
        .collect();
    if translated.len() == distinct.len() {
        translated.into_iter().map(str::to_string).collect()
    } else {
        names.to_vec()
    }
}
