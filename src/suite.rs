use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One input/expected-output pair for a challenge function
///
/// `input` holds the positional arguments the entry point is called with;
/// values are heterogeneous JSON (numbers, strings, lists, booleans).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TestCase {
    pub input: Vec<Value>,
    pub expected: Value,
}

/// The registered test suite for one challenge
///
/// Immutable once registered. Test order is significant: results are
/// reported with 1-based indices into this list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeSuite {
    pub id: String,
    pub title: String,
    pub entry_point: String,
    pub tests: Vec<TestCase>,
}

/// Read-only lookup table of challenge suites, keyed by challenge id
///
/// Built once at startup, either from the compiled-in defaults or from a
/// JSON file, and never mutated afterwards.
pub struct SuiteRegistry {
    suites: HashMap<String, ChallengeSuite>,
}

impl SuiteRegistry {
    pub fn new(suites: Vec<ChallengeSuite>) -> Self {
        let suites = suites.into_iter().map(|s| (s.id.clone(), s)).collect();
        Self { suites }
    }

    /// Load a registry from a JSON file containing an array of suites
    pub fn from_file(path: &str) -> std::io::Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let suites: Vec<ChallengeSuite> =
            serde_json::from_reader(reader).map_err(std::io::Error::from)?;
        Ok(Self::new(suites))
    }

    pub fn get(&self, id: &str) -> Option<&ChallengeSuite> {
        self.suites.get(id)
    }

    pub fn len(&self) -> usize {
        self.suites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }

    /// The suites compiled into the binary
    pub fn builtin() -> Self {
        Self::new(vec![
            ChallengeSuite {
                id: "is_prime".to_string(),
                title: "Prime Check".to_string(),
                entry_point: "is_prime".to_string(),
                tests: vec![
                    TestCase {
                        input: vec![json!(2)],
                        expected: json!(true),
                    },
                    TestCase {
                        input: vec![json!(4)],
                        expected: json!(false),
                    },
                    TestCase {
                        input: vec![json!(13)],
                        expected: json!(true),
                    },
                    TestCase {
                        input: vec![json!(1)],
                        expected: json!(false),
                    },
                ],
            },
            ChallengeSuite {
                id: "fizzbuzz".to_string(),
                title: "FizzBuzz".to_string(),
                entry_point: "fizzbuzz".to_string(),
                tests: vec![
                    TestCase {
                        input: vec![json!(3)],
                        expected: json!("Fizz"),
                    },
                    TestCase {
                        input: vec![json!(5)],
                        expected: json!("Buzz"),
                    },
                    TestCase {
                        input: vec![json!(15)],
                        expected: json!("FizzBuzz"),
                    },
                    TestCase {
                        input: vec![json!(7)],
                        expected: json!("7"),
                    },
                ],
            },
            ChallengeSuite {
                id: "sum_list".to_string(),
                title: "Sum of a List".to_string(),
                entry_point: "sum_list".to_string(),
                tests: vec![
                    TestCase {
                        input: vec![json!([1, 2, 3])],
                        expected: json!(6),
                    },
                    TestCase {
                        input: vec![json!([])],
                        expected: json!(0),
                    },
                    TestCase {
                        input: vec![json!([-5, 5, 10])],
                        expected: json!(10),
                    },
                ],
            },
            ChallengeSuite {
                id: "reverse_string".to_string(),
                title: "Reverse a String".to_string(),
                entry_point: "reverse_string".to_string(),
                tests: vec![
                    TestCase {
                        input: vec![json!("hello")],
                        expected: json!("olleh"),
                    },
                    TestCase {
                        input: vec![json!("")],
                        expected: json!(""),
                    },
                    TestCase {
                        input: vec![json!("ab cd")],
                        expected: json!("dc ba"),
                    },
                ],
            },
        ])
    }
}
