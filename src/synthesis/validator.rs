use tracing::debug;

use super::SynthesizedFunction;

/// Run every assertion against `function` and describe each one that did not hold.
///
/// All assertions run, in order, whatever happened to the previous ones. An
/// empty result means the candidate passed.
pub fn validate(function: &SynthesizedFunction, tests: &[String]) -> Vec<String> {
    let mut failures = Vec::new();

    for test in tests {
        match function.evaluate::<bool>(test) {
            Ok(true) => debug!(function = function.name(), test = %test, "assertion passed"),
            Ok(false) => failures.push(format!("assertion `{}` failed", test)),
            Err(error) => failures.push(format!(
                "assertion `{}` should pass, but raised `{}`",
                test, error
            )),
        }
    }

    failures
}
