//! Init forms, expressions describing how the initial value of an agent
//! variable is generated.

use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use crate::error::Error;
use crate::Result;

/// Expression generating the initial value of a single agent variable.
///
/// # Syntax
///
/// - `<literal>` or `const(<literal>)` - the same value for every agent
/// - `uniform(<min>, <max>)` - float drawn uniformly from the closed range
/// - `uniform_int(<min>, <max>)` - integer drawn uniformly from the closed
///   range
/// - `seq` or `seq(<start>)` - sequential number, counted per agent type,
///   starting at 1 unless specified otherwise
/// - `region` - 1-based index of the region the agent is placed in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InitForm {
    Const(String),
    Uniform(f64, f64),
    UniformInt(i64, i64),
    Seq(i64),
    Region,
}

impl InitForm {
    /// Checks that the form can be used for generating values.
    pub fn validate(&self) -> Result<()> {
        match self {
            InitForm::Const(s) if s.is_empty() => {
                Err(Error::InvalidInitForm("empty constant".to_string()))
            }
            InitForm::Uniform(min, max) => {
                if !min.is_finite() || !max.is_finite() || min > max {
                    Err(Error::InvalidInitForm(format!(
                        "invalid range: {}, {}",
                        min, max
                    )))
                } else {
                    Ok(())
                }
            }
            InitForm::UniformInt(min, max) if min > max => Err(Error::InvalidInitForm(format!(
                "invalid range: {}, {}",
                min, max
            ))),
            _ => Ok(()),
        }
    }

    /// Generates a value for the agent at `index` (counted within its
    /// agent type) placed in `region`.
    ///
    /// Fails if a sequence runs past the integer range.
    pub fn generate<R: Rng>(&self, rng: &mut R, region: u32, index: u64) -> Result<String> {
        let value = match self {
            InitForm::Const(s) => s.clone(),
            InitForm::Uniform(min, max) => Uniform::new_inclusive(*min, *max).sample(rng).to_string(),
            InitForm::UniformInt(min, max) => {
                Uniform::new_inclusive(*min, *max).sample(rng).to_string()
            }
            InitForm::Seq(start) => i64::try_from(index)
                .ok()
                .and_then(|i| start.checked_add(i))
                .ok_or_else(|| {
                    Error::InvalidInitForm(format!(
                        "sequence overflow: seq({}) at index {}",
                        start, index
                    ))
                })?
                .to_string(),
            InitForm::Region => region.to_string(),
        };
        Ok(value)
    }
}

impl FromStr for InitForm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidInitForm("empty expression".to_string()));
        }
        match s {
            "region" => return Ok(InitForm::Region),
            "seq" => return Ok(InitForm::Seq(1)),
            _ => (),
        }

        let (func, args) = match (s.find('('), s.ends_with(')')) {
            (Some(open), true) => (s[..open].trim(), &s[open + 1..s.len() - 1]),
            _ => return Ok(InitForm::Const(s.to_string())),
        };
        // constant literals are taken as is, commas and parentheses included
        if func == "const" {
            let form = InitForm::Const(args.trim().to_string());
            form.validate()?;
            return Ok(form);
        }
        let args: Vec<&str> = args.split(',').map(|a| a.trim()).collect();
        let form = match (func, args.as_slice()) {
            ("uniform", [min, max]) => InitForm::Uniform(parse_arg(min, s)?, parse_arg(max, s)?),
            ("uniform_int", [min, max]) => {
                InitForm::UniformInt(parse_arg(min, s)?, parse_arg(max, s)?)
            }
            ("seq", [start]) => InitForm::Seq(parse_arg(start, s)?),
            ("uniform", _) | ("uniform_int", _) | ("seq", _) => {
                return Err(Error::InvalidInitForm(format!(
                    "wrong number of arguments: {}",
                    s
                )))
            }
            _ => {
                return Err(Error::InvalidInitForm(format!(
                    "unknown function \"{}\": {}",
                    func, s
                )))
            }
        };
        form.validate()?;
        Ok(form)
    }
}

fn parse_arg<T: FromStr>(arg: &str, expr: &str) -> Result<T> {
    arg.parse::<T>().map_err(|_| {
        Error::InvalidInitForm(format!("failed parsing argument \"{}\": {}", arg, expr))
    })
}

impl fmt::Display for InitForm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InitForm::Const(s) => {
                if s == "region" || s == "seq" || s.contains('(') {
                    write!(f, "const({})", s)
                } else {
                    write!(f, "{}", s)
                }
            }
            InitForm::Uniform(min, max) => write!(f, "uniform({}, {})", min, max),
            InitForm::UniformInt(min, max) => write!(f, "uniform_int({}, {})", min, max),
            InitForm::Seq(start) => write!(f, "seq({})", start),
            InitForm::Region => write!(f, "region"),
        }
    }
}

impl TryFrom<String> for InitForm {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        InitForm::from_str(&s)
    }
}

impl From<InitForm> for String {
    fn from(form: InitForm) -> Self {
        form.to_string()
    }
}

#[test]
fn parse_init_forms() {
    assert_eq!("42".parse::<InitForm>().unwrap(), InitForm::Const("42".to_string()));
    assert_eq!(
        "const(seq)".parse::<InitForm>().unwrap(),
        InitForm::Const("seq".to_string())
    );
    assert_eq!(
        "uniform(0, 2.5)".parse::<InitForm>().unwrap(),
        InitForm::Uniform(0.0, 2.5)
    );
    assert_eq!(
        " uniform_int(1,10) ".parse::<InitForm>().unwrap(),
        InitForm::UniformInt(1, 10)
    );
    assert_eq!("seq".parse::<InitForm>().unwrap(), InitForm::Seq(1));
    assert_eq!("seq(100)".parse::<InitForm>().unwrap(), InitForm::Seq(100));
    assert_eq!("region".parse::<InitForm>().unwrap(), InitForm::Region);
}

#[test]
fn parse_invalid_init_forms() {
    for expr in &["", "uniform(3, 1)", "uniform(a, 1)", "seq(1, 2)", "gauss(0, 1)"] {
        assert!(
            matches!(expr.parse::<InitForm>(), Err(Error::InvalidInitForm(_))),
            "expected failure for {:?}",
            expr
        );
    }
}

#[test]
fn display_parses_back() {
    let forms = vec![
        InitForm::Const("region".to_string()),
        InitForm::Const("1.5".to_string()),
        InitForm::Const("f(x)".to_string()),
        InitForm::Const("a)".to_string()),
        InitForm::Uniform(-1.0, 1.0),
        InitForm::UniformInt(0, 5),
        InitForm::Seq(7),
        InitForm::Region,
    ];
    for form in forms {
        assert_eq!(form.to_string().parse::<InitForm>().unwrap(), form);
    }
}

#[test]
fn generate_values() {
    use rand::SeedableRng;
    let mut rng = rand::rngs::StdRng::seed_from_u64(1);
    assert_eq!(InitForm::Seq(10).generate(&mut rng, 1, 4).unwrap(), "14");
    assert_eq!(InitForm::Region.generate(&mut rng, 3, 0).unwrap(), "3");
    for _ in 0..100 {
        let v: i64 = InitForm::UniformInt(2, 4)
            .generate(&mut rng, 1, 0)
            .unwrap()
            .parse()
            .unwrap();
        assert!(v >= 2 && v <= 4);
        let f: f64 = InitForm::Uniform(0.5, 0.5)
            .generate(&mut rng, 1, 0)
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(f, 0.5);
    }
}

#[test]
fn parsed_literals_display_back() {
    for expr in &["a,b(c", "x (y", "const(a, b)", "const(f(x))", "(1)", "1,2"] {
        let form = match expr.parse::<InitForm>() {
            Ok(f) => f,
            Err(_) => continue,
        };
        assert_eq!(
            form.to_string().parse::<InitForm>().unwrap(),
            form,
            "failed for {:?}",
            expr
        );
    }
    assert_eq!(
        "a,b(c".parse::<InitForm>().unwrap(),
        InitForm::Const("a,b(c".to_string())
    );
    assert_eq!(
        "const(a, b)".parse::<InitForm>().unwrap(),
        InitForm::Const("a, b".to_string())
    );
    assert!("const()".parse::<InitForm>().is_err());
}

#[test]
fn seq_overflow_is_an_error() {
    use rand::SeedableRng;
    let mut rng = rand::rngs::StdRng::seed_from_u64(1);
    let form = InitForm::Seq(i64::MAX);
    assert_eq!(form.generate(&mut rng, 1, 0).unwrap(), i64::MAX.to_string());
    assert!(matches!(
        form.generate(&mut rng, 1, 1),
        Err(Error::InvalidInitForm(_))
    ));
}
