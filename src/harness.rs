use anyhow::Result;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;

use crate::suite::{ChallengeSuite, TestCase};

/// Markers bounding the structured result payload on stdout
///
/// Long random-suffixed constants so learner print output is vanishingly
/// unlikely to contain them by accident.
pub const PAYLOAD_BEGIN: &str = "<<<PYJUDGE_RESULT_2f8c4a9e11d04b67a3c5>>>";
pub const PAYLOAD_END: &str = "<<<END_PYJUDGE_RESULT_2f8c4a9e11d04b67a3c5>>>";

/// Suite data shipped into the harness as base64(JSON)
///
/// The harness preamble decodes this itself. Test inputs and expected
/// values are never interpolated into the program text as literals, so
/// challenge data cannot inject code and value types survive the process
/// boundary intact.
#[derive(Serialize)]
struct HarnessData<'a> {
    entrypoint: &'a str,
    tests: &'a [TestCase],
}

/// Epilogue appended after the learner's code
///
/// All harness names carry a `_pyjudge_` prefix to keep out of the way of
/// learner globals. `default=str` coerces values JSON cannot represent
/// instead of failing the whole dump. The payload print is the last thing
/// the program does.
const HARNESS_EPILOGUE: &str = r#"
import base64 as _pyjudge_b64
import json as _pyjudge_json

_pyjudge_data = _pyjudge_json.loads(_pyjudge_b64.b64decode("%DATA%").decode("utf-8"))
_pyjudge_report = {"entrypoint": _pyjudge_data["entrypoint"]}
_pyjudge_fn = globals().get(_pyjudge_data["entrypoint"])
if not callable(_pyjudge_fn):
    _pyjudge_report["missingEntryPoint"] = True
else:
    _pyjudge_tests = []
    for _pyjudge_i, _pyjudge_case in enumerate(_pyjudge_data["tests"], 1):
        try:
            _pyjudge_value = _pyjudge_fn(*_pyjudge_case["input"])
            _pyjudge_tests.append({
                "index": _pyjudge_i,
                "passed": bool(_pyjudge_value == _pyjudge_case["expected"]),
                "value": _pyjudge_value,
                "expected": _pyjudge_case["expected"],
            })
        except Exception as _pyjudge_exc:
            _pyjudge_tests.append({
                "index": _pyjudge_i,
                "passed": False,
                "error": "%s: %s" % (type(_pyjudge_exc).__name__, _pyjudge_exc),
            })
    _pyjudge_report["tests"] = _pyjudge_tests
print("%BEGIN%")
print(_pyjudge_json.dumps(_pyjudge_report, default=str))
print("%END%")
"#;

/// Compiles learner code and a suite into one self-contained Python program
///
/// The learner's code goes in verbatim at the top as a single opaque block;
/// the fixed epilogue then checks the entry point, runs each test case
/// inside its own error boundary and prints the sentinel-delimited payload.
/// If the learner's code raises at module scope, nothing after it runs and
/// the parser falls back to stderr.
pub fn compile_harness(code: &str, suite: &ChallengeSuite) -> Result<String> {
    let data = HarnessData {
        entrypoint: &suite.entry_point,
        tests: &suite.tests,
    };
    let encoded = BASE64.encode(serde_json::to_vec(&data)?);

    let epilogue = HARNESS_EPILOGUE
        .replace("%DATA%", &encoded)
        .replace("%BEGIN%", PAYLOAD_BEGIN)
        .replace("%END%", PAYLOAD_END);

    Ok(format!("{code}\n{epilogue}"))
}
