use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const LEAKY_RELU_SLOPE: f64 = 0.01;
const ELU_ALPHA: f64 = 1.0;
const GELU_COEFF: f64 = 0.044715;
const SQRT_2_OVER_PI: f64 = 0.797_884_560_802_865_4;

/// The closed set of supported hidden-layer nonlinearities.
///
/// Every variant carries analytic first and second derivatives, which the
/// network needs to differentiate the input gradient with respect to its
/// parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    Mish,
    #[serde(rename = "ReLU")]
    Relu,
    #[serde(rename = "LeakyReLU")]
    LeakyRelu,
    #[serde(rename = "ELU")]
    Elu,
    #[serde(rename = "GELU")]
    Gelu,
}

static ACTIVATION_NAMES: phf::Map<&'static str, Activation> = phf::phf_map! {
    "Mish" => Activation::Mish,
    "ReLU" => Activation::Relu,
    "LeakyReLU" => Activation::LeakyRelu,
    "ELU" => Activation::Elu,
    "GELU" => Activation::Gelu,
};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Unsupported activation function: '{0}' (expected one of Mish, ReLU, LeakyReLU, ELU, GELU)")]
pub struct UnknownActivation(pub String);

impl Activation {
    pub const ALL: [Activation; 5] = [
        Activation::Mish,
        Activation::Relu,
        Activation::LeakyRelu,
        Activation::Elu,
        Activation::Gelu,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Activation::Mish => "Mish",
            Activation::Relu => "ReLU",
            Activation::LeakyRelu => "LeakyReLU",
            Activation::Elu => "ELU",
            Activation::Gelu => "GELU",
        }
    }

    #[inline]
    pub fn value(&self, x: f64) -> f64 {
        match self {
            Activation::Mish => x * softplus(x).tanh(),
            Activation::Relu => x.max(0.0),
            Activation::LeakyRelu => {
                if x > 0.0 {
                    x
                } else {
                    LEAKY_RELU_SLOPE * x
                }
            }
            Activation::Elu => {
                if x > 0.0 {
                    x
                } else {
                    ELU_ALPHA * x.exp_m1()
                }
            }
            Activation::Gelu => {
                let t = gelu_inner(x).tanh();
                0.5 * x * (1.0 + t)
            }
        }
    }

    #[inline]
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            Activation::Mish => {
                let t = softplus(x).tanh();
                let s = sigmoid(x);
                t + x * (1.0 - t * t) * s
            }
            Activation::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::LeakyRelu => {
                if x > 0.0 {
                    1.0
                } else {
                    LEAKY_RELU_SLOPE
                }
            }
            Activation::Elu => {
                if x > 0.0 {
                    1.0
                } else {
                    ELU_ALPHA * x.exp()
                }
            }
            Activation::Gelu => {
                let t = gelu_inner(x).tanh();
                let du = SQRT_2_OVER_PI * (1.0 + 3.0 * GELU_COEFF * x * x);
                0.5 * (1.0 + t) + 0.5 * x * (1.0 - t * t) * du
            }
        }
    }

    #[inline]
    pub fn second_derivative(&self, x: f64) -> f64 {
        match self {
            Activation::Mish => {
                let t = softplus(x).tanh();
                let s = sigmoid(x);
                let sech2 = 1.0 - t * t;
                sech2 * s * (2.0 + x * ((1.0 - s) - 2.0 * t * s))
            }
            Activation::Relu | Activation::LeakyRelu => 0.0,
            Activation::Elu => {
                if x > 0.0 {
                    0.0
                } else {
                    ELU_ALPHA * x.exp()
                }
            }
            Activation::Gelu => {
                let t = gelu_inner(x).tanh();
                let sech2 = 1.0 - t * t;
                let du = SQRT_2_OVER_PI * (1.0 + 3.0 * GELU_COEFF * x * x);
                let d2u = SQRT_2_OVER_PI * 6.0 * GELU_COEFF * x;
                sech2 * du + 0.5 * x * sech2 * (d2u - 2.0 * t * du * du)
            }
        }
    }
}

impl FromStr for Activation {
    type Err = UnknownActivation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ACTIVATION_NAMES
            .get(s.trim())
            .copied()
            .ok_or_else(|| UnknownActivation(s.to_string()))
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[inline]
fn softplus(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp().ln_1p() }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[inline]
fn gelu_inner(x: f64) -> f64 {
    SQRT_2_OVER_PI * (x + GELU_COEFF * x * x * x)
}
