//! Static parameter schema for every callable function, plus the validator
//! that turns loosely-typed host arguments into typed values.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::{
    error::ToolError,
    model::{Coordinates, FunctionName, LocationInput, UnitsSystem, json_type_name},
};

/// Semantic type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamType {
    String,
    Number,
    /// A number that must be whole, used for hour/day counts.
    Integer,
    /// A string restricted to a closed, non-empty set.
    Enum(&'static [&'static str]),
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String | ParamType::Enum(_) => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSpec {
    pub name: &'static str,
    /// Alternate names accepted from the host; the canonical name wins if both are given.
    pub aliases: &'static [&'static str],
    pub ty: ParamType,
    pub required: bool,
    /// Inclusive numeric bounds.
    pub range: Option<(f64, f64)>,
    pub description: &'static str,
}

impl ParameterSpec {
    pub const fn new(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            ty,
            required: false,
            range: None,
            description,
        }
    }

    pub const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    pub const fn aliases(self, aliases: &'static [&'static str]) -> Self {
        Self { aliases, ..self }
    }

    pub const fn range(self, min: f64, max: f64) -> Self {
        Self {
            range: Some((min, max)),
            ..self
        }
    }

    fn raw_value<'a>(&self, args: &'a Map<String, Value>) -> Option<&'a Value> {
        std::iter::once(&self.name)
            .chain(self.aliases)
            .filter_map(|key| args.get(*key))
            .find(|value| !value.is_null())
    }

    fn coerce(&self, value: &Value) -> Result<ArgValue, ToolError> {
        let parsed = match self.ty {
            ParamType::String => match value {
                Value::String(s) => ArgValue::Text(s.clone()),
                other => return Err(self.type_error(other)),
            },
            ParamType::Enum(allowed) => match value {
                Value::String(s) if allowed.iter().any(|a| *a == s.as_str()) => ArgValue::Text(s.clone()),
                Value::String(_) => {
                    return Err(ToolError::InvalidValue {
                        name: self.name,
                        allowed,
                    });
                }
                other => return Err(self.type_error(other)),
            },
            ParamType::Number => {
                let number = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                match number.filter(|n| n.is_finite()) {
                    Some(n) => ArgValue::Number(n),
                    None => return Err(self.type_error(value)),
                }
            }
            ParamType::Integer => {
                let integer = match value {
                    Value::Number(n) => n
                        .as_i64()
                        .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                };
                match integer {
                    Some(i) => ArgValue::Integer(i),
                    None => return Err(self.type_error(value)),
                }
            }
        };

        if let (Some((min, max)), Some(n)) = (self.range, parsed.as_f64()) {
            if !(min..=max).contains(&n) {
                return Err(ToolError::OutOfRange {
                    name: self.name,
                    min,
                    max,
                });
            }
        }

        Ok(parsed)
    }

    fn type_error(&self, value: &Value) -> ToolError {
        ToolError::InvalidType {
            name: self.name,
            expected: self.ty.as_str(),
            actual: json_type_name(value),
        }
    }

    fn json_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(self.ty.as_str()));
        schema.insert("description".into(), json!(self.description));
        if let ParamType::Enum(allowed) = self.ty {
            schema.insert("enum".into(), json!(allowed));
        }
        if let Some((min, max)) = self.range {
            schema.insert("minimum".into(), json!(min));
            schema.insert("maximum".into(), json!(max));
        }
        Value::Object(schema)
    }
}

/// The hour/day count parameter of a forecast function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountParam {
    pub name: &'static str,
    pub default: u32,
}

/// Static description of one callable function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunctionSpec {
    pub name: FunctionName,
    pub description: &'static str,
    /// Path appended to the configured base URL.
    pub endpoint: &'static str,
    pub params: &'static [ParameterSpec],
    pub count: Option<CountParam>,
}

pub const MAX_FORECAST_HOURS: u32 = 48;
pub const MAX_FORECAST_DAYS: u32 = 10;

const LATITUDE: ParameterSpec =
    ParameterSpec::new("latitude", ParamType::Number, "Latitude in decimal degrees")
        .aliases(&["lat"])
        .range(Coordinates::LATITUDE_RANGE.0, Coordinates::LATITUDE_RANGE.1);

const LONGITUDE: ParameterSpec =
    ParameterSpec::new("longitude", ParamType::Number, "Longitude in decimal degrees")
        .aliases(&["lon"])
        .range(Coordinates::LONGITUDE_RANGE.0, Coordinates::LONGITUDE_RANGE.1);

const ADDRESS: ParameterSpec = ParameterSpec::new(
    "address",
    ParamType::String,
    "Free-text address or place name, resolved via geocoding when latitude/longitude are absent. \
     A \"lat,lon\" literal is also accepted.",
)
.aliases(&["location"]);

const UNITS: ParameterSpec = ParameterSpec::new(
    "unitsSystem",
    ParamType::Enum(UnitsSystem::ALLOWED),
    "Unit system to use",
);

const LANGUAGE: ParameterSpec = ParameterSpec::new(
    "language",
    ParamType::String,
    "Language code for localized output, e.g. \"en\" or \"pt-BR\"",
);

const HOURS: ParameterSpec =
    ParameterSpec::new("hours", ParamType::Integer, "Number of forecast hours")
        .range(1.0, MAX_FORECAST_HOURS as f64);

const DAYS: ParameterSpec = ParameterSpec::new("days", ParamType::Integer, "Number of forecast days")
    .range(1.0, MAX_FORECAST_DAYS as f64);

pub static FUNCTIONS: [FunctionSpec; 3] = [
    FunctionSpec {
        name: FunctionName::CurrentConditions,
        description: "Current weather conditions for a location.",
        endpoint: "/currentConditions:lookup",
        params: &[LATITUDE, LONGITUDE, ADDRESS, UNITS, LANGUAGE],
        count: None,
    },
    FunctionSpec {
        name: FunctionName::HourlyForecast,
        description: "Hourly forecast for a location, up to 48 hours ahead.",
        endpoint: "/forecast/hours:lookup",
        params: &[LATITUDE, LONGITUDE, ADDRESS, UNITS, LANGUAGE, HOURS],
        count: Some(CountParam {
            name: "hours",
            default: 24,
        }),
    },
    FunctionSpec {
        name: FunctionName::DailyForecast,
        description: "Daily forecast for a location, up to 10 days ahead.",
        endpoint: "/forecast/days:lookup",
        params: &[LATITUDE, LONGITUDE, ADDRESS, UNITS, LANGUAGE, DAYS],
        count: Some(CountParam {
            name: "days",
            default: 10,
        }),
    },
];

/// Resolve a function name to its spec.
pub fn lookup(name: &str) -> Result<&'static FunctionSpec, ToolError> {
    let function = FunctionName::try_from(name)?;
    Ok(FunctionSpec::for_function(function))
}

/// Tool definitions for every supported function, in declaration order.
pub fn definitions() -> Vec<Value> {
    FunctionName::all()
        .iter()
        .map(|name| FunctionSpec::for_function(*name).definition())
        .collect()
}

impl FunctionSpec {
    pub fn for_function(function: FunctionName) -> &'static FunctionSpec {
        match function {
            FunctionName::CurrentConditions => &FUNCTIONS[0],
            FunctionName::HourlyForecast => &FUNCTIONS[1],
            FunctionName::DailyForecast => &FUNCTIONS[2],
        }
    }

    /// Validate raw host arguments against this function's parameters.
    ///
    /// Parameters are checked in declaration order and the first failure is
    /// returned. Unknown arguments are ignored.
    pub fn validate(&self, args: &Map<String, Value>) -> Result<ValidatedArgs, ToolError> {
        let mut values = BTreeMap::new();

        for param in self.params {
            match param.raw_value(args) {
                Some(raw) => {
                    values.insert(param.name, param.coerce(raw)?);
                }
                None if param.required => {
                    return Err(ToolError::MissingParameter { name: param.name });
                }
                None => {}
            }
        }

        Ok(ValidatedArgs {
            function: self.name,
            count: self.count,
            values,
        })
    }

    /// Tool definition in the `{name, description, parameters}` shape hosts list.
    pub fn definition(&self) -> Value {
        let mut properties = Map::new();
        for param in self.params {
            let mut schema = param.json_schema();
            if let (Some(count), Value::Object(map)) = (self.count, &mut schema) {
                if count.name == param.name {
                    map.insert("default".into(), json!(count.default));
                }
            }
            properties.insert(param.name.to_string(), schema);
        }

        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "name": self.name.as_str(),
            "description": format!(
                "{} Provide either latitude and longitude, or an address.",
                self.description
            ),
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": true,
            },
        })
    }
}

/// A typed argument value produced by validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Number(f64),
    Integer(i64),
    Text(String),
}

impl ArgValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Number(n) => Some(*n),
            ArgValue::Integer(i) => Some(*i as f64),
            ArgValue::Text(_) => None,
        }
    }
}

/// Arguments that passed schema validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedArgs {
    function: FunctionName,
    count: Option<CountParam>,
    values: BTreeMap<&'static str, ArgValue>,
}

impl ValidatedArgs {
    pub fn function(&self) -> FunctionName {
        self.function
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(ArgValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// How the caller located the request.
    ///
    /// A complete coordinate pair wins over an address. A half pair is an
    /// error even when an address is present.
    pub fn location(&self) -> Result<LocationInput, ToolError> {
        let address = self
            .text("address")
            .map(str::trim)
            .filter(|a| !a.is_empty());

        match (self.number("latitude"), self.number("longitude"), address) {
            (Some(lat), Some(lon), _) => Ok(LocationInput::Coordinates(Coordinates::new(lat, lon)?)),
            (Some(_), None, _) => Err(ToolError::MissingParameter { name: "longitude" }),
            (None, Some(_), _) => Err(ToolError::MissingParameter { name: "latitude" }),
            (None, None, Some(address)) => Ok(LocationInput::Address(address.to_string())),
            (None, None, None) => Err(ToolError::missing_location(
                "provide latitude and longitude, or an address",
            )),
        }
    }

    /// The hour/day count with its default applied, for forecast functions.
    pub fn count(&self) -> Result<Option<u32>, ToolError> {
        let Some(count) = self.count else {
            return Ok(None);
        };
        match self.values.get(count.name) {
            Some(ArgValue::Integer(i)) => u32::try_from(*i).map(Some).map_err(|_| {
                ToolError::InvalidType {
                    name: count.name,
                    expected: "integer",
                    actual: "number",
                }
            }),
            _ => Ok(Some(count.default)),
        }
    }
}
