//! WebAssembly binding of the matrix entry point.

use wasm_bindgen::prelude::*;

use crate::lexicographic::{self, MatrixProgress};

/// Solves a dense goal matrix and returns every progress snapshot.
///
/// `coefficients` is an array of rows, `constants` one number per row
/// (`NaN` marks a soft zero row).
#[wasm_bindgen(js_name = solveMatrix)]
pub fn solve_matrix(coefficients: JsValue, constants: JsValue) -> Result<JsValue, JsValue> {
    let coefficients: Vec<Vec<f64>> = serde_wasm_bindgen::from_value(coefficients)?;
    let constants: Vec<f64> = serde_wasm_bindgen::from_value(constants)?;
    let snapshots = lexicographic::solve(&coefficients, &constants)
        .and_then(|steps| steps.collect::<Result<Vec<MatrixProgress>, _>>())
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(serde_wasm_bindgen::to_value(&snapshots)?)
}
