use super::activation::Activation;
use crate::core::context::{ExecutionContext, RngStream};
use crate::core::models::architecture::{Architecture, ArchitectureError};
use crate::core::models::potential::{PotentialSurface, SurfacePoint};
use crate::core::models::sample::DistancePair;
use nalgebra::{DMatrix, DVector};
use rand::Rng;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub const OUTPUT_LAYER_KEY: &str = "output_layer";

/// An affine layer `z = W a + b`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dense {
    pub weight: DMatrix<f64>,
    pub bias: DVector<f64>,
}

impl Dense {
    fn uniform<R: Rng + ?Sized>(fan_in: usize, fan_out: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (fan_in as f64).sqrt();
        Self {
            weight: DMatrix::from_fn(fan_out, fan_in, |_, _| rng.gen_range(-bound..bound)),
            bias: DVector::from_fn(fan_out, |_, _| rng.gen_range(-bound..bound)),
        }
    }

    pub(crate) fn zeros_like(&self) -> Self {
        Self {
            weight: DMatrix::zeros(self.weight.nrows(), self.weight.ncols()),
            bias: DVector::zeros(self.bias.len()),
        }
    }

    #[inline]
    fn forward(&self, input: &DVector<f64>) -> DVector<f64> {
        &self.weight * input + &self.bias
    }

    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// Everything recorded by one forward pass. Dropout masks are frozen here so
/// that the input gradient and the parameter gradient see the same network.
#[derive(Debug, Clone)]
pub(crate) struct Trace {
    input: DVector<f64>,
    pre_activations: Vec<DVector<f64>>,
    activations: Vec<DVector<f64>>,
    masks: Vec<Option<DVector<f64>>>,
    pub(crate) value: f64,
}

impl Trace {
    fn layer_input(&self, layer: usize) -> &DVector<f64> {
        if layer == 0 {
            &self.input
        } else {
            &self.activations[layer - 1]
        }
    }
}

/// Feed-forward energy surrogate mapping `(r12, r23)` to a scalar.
///
/// `layers` holds the hidden layers followed by the output layer. Every
/// hidden layer is followed by the activation; the output layer is linear.
#[derive(Debug, Clone)]
pub struct Surrogate {
    architecture: Architecture,
    layers: Vec<Dense>,
    mode: Mode,
}

impl Surrogate {
    pub fn new(architecture: Architecture, ctx: &ExecutionContext) -> Result<Self, ArchitectureError> {
        let mut rng = ctx.rng(RngStream::Initialization);
        Self::with_rng(architecture, &mut rng)
    }

    pub fn with_rng<R: Rng + ?Sized>(
        architecture: Architecture,
        rng: &mut R,
    ) -> Result<Self, ArchitectureError> {
        architecture.validate()?;
        let mut layers = Vec::with_capacity(architecture.num_layers + 1);
        let mut fan_in = architecture.input_dim;
        for _ in 0..architecture.num_layers {
            layers.push(Dense::uniform(fan_in, architecture.hidden_dim, rng));
            fan_in = architecture.hidden_dim;
        }
        layers.push(Dense::uniform(fan_in, architecture.output_dim, rng));
        Ok(Self {
            architecture,
            layers,
            mode: Mode::Eval,
        })
    }

    pub fn architecture(&self) -> &Architecture {
        &self.architecture
    }

    pub fn activation(&self) -> Activation {
        self.architecture.activation
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [Dense] {
        &mut self.layers
    }

    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(Dense::num_parameters).sum()
    }

    /// Storage key of layer `index`: `layers.<i>` for hidden layers and
    /// `output_layer` for the last one.
    pub fn layer_key(&self, index: usize) -> String {
        if index + 1 == self.layers.len() {
            OUTPUT_LAYER_KEY.to_string()
        } else {
            format!("layers.{index}")
        }
    }

    fn hidden_count(&self) -> usize {
        self.layers.len() - 1
    }

    fn output(&self) -> &Dense {
        &self.layers[self.hidden_count()]
    }

    /// Output weights as a column vector, i.e. `∂V/∂a_L`.
    fn output_direction(&self) -> DVector<f64> {
        self.output().weight.row(0).transpose()
    }

    /// Runs a forward pass and keeps the intermediates. Dropout is sampled
    /// only in training mode and only when an RNG is supplied.
    pub(crate) fn forward_traced<R: Rng + ?Sized>(
        &self,
        coords: DistancePair,
        mut rng: Option<&mut R>,
    ) -> Trace {
        let input = coords.to_input();
        let act = self.architecture.activation;
        let keep = 1.0 - self.architecture.dropout;
        let use_dropout = self.mode == Mode::Train && self.architecture.dropout > 0.0;

        let hidden = self.hidden_count();
        let mut pre_activations = Vec::with_capacity(hidden);
        let mut activations = Vec::with_capacity(hidden);
        let mut masks = Vec::with_capacity(hidden);

        let mut current = input.clone();
        for layer in &self.layers[..hidden] {
            let z = layer.forward(&current);
            let mut a = z.map(|v| act.value(v));
            let mask = match rng.as_deref_mut() {
                Some(r) if use_dropout => {
                    let m = DVector::from_fn(z.len(), |_, _| {
                        if r.gen_bool(keep) { 1.0 / keep } else { 0.0 }
                    });
                    a.component_mul_assign(&m);
                    Some(m)
                }
                _ => None,
            };
            pre_activations.push(z);
            current = a.clone();
            activations.push(a);
            masks.push(mask);
        }

        let value = self.output().forward(&current)[0];
        Trace {
            input,
            pre_activations,
            activations,
            masks,
            value,
        }
    }

    /// `m ⊙ σ'(z)` for hidden layer `l`.
    fn local_slope(&self, trace: &Trace, l: usize) -> DVector<f64> {
        let act = self.architecture.activation;
        let slope = trace.pre_activations[l].map(|v| act.derivative(v));
        apply_mask(slope, &trace.masks[l])
    }

    /// Reverse-mode gradient `∂V/∂input` of a recorded pass.
    pub(crate) fn input_gradient(&self, trace: &Trace) -> DVector<f64> {
        let mut delta = self.output_direction();
        for l in (0..self.hidden_count()).rev() {
            let e = delta.component_mul(&self.local_slope(trace, l));
            delta = self.layers[l].weight.tr_mul(&e);
        }
        delta
    }

    /// Parameter gradient of `J = c·V + u·∇ₓV` at a recorded pass.
    ///
    /// The second term is the directional derivative of `V` along `u`, so it
    /// is carried forward as a tangent and then differentiated in reverse
    /// together with the value. Returned layers mirror [`Self::layers`].
    pub(crate) fn parameter_gradients(&self, trace: &Trace, c: f64, u: &[f64; 2]) -> Vec<Dense> {
        let act = self.architecture.activation;
        let hidden = self.hidden_count();

        // Forward tangent along u.
        let mut tangent_pre = Vec::with_capacity(hidden);
        let mut tangent_post = Vec::with_capacity(hidden);
        let mut a_dot = DVector::from_column_slice(u);
        for l in 0..hidden {
            let z_dot = &self.layers[l].weight * &a_dot;
            a_dot = z_dot.component_mul(&self.local_slope(trace, l));
            tangent_pre.push(z_dot);
            tangent_post.push(a_dot.clone());
        }

        let mut grads: Vec<Dense> = self.layers.iter().map(Dense::zeros_like).collect();

        let last_a = trace.layer_input(hidden);
        let last_a_dot = if hidden == 0 {
            DVector::from_column_slice(u)
        } else {
            tangent_post[hidden - 1].clone()
        };
        let w_out = last_a * c + &last_a_dot;
        grads[hidden].weight = DMatrix::from_row_slice(1, w_out.len(), w_out.as_slice());
        grads[hidden].bias[0] = c;

        let direction = self.output_direction();
        let mut a_bar = &direction * c;
        let mut a_dot_bar = direction;

        for l in (0..hidden).rev() {
            let slope = self.local_slope(trace, l);
            let curvature = apply_mask(
                trace.pre_activations[l].map(|v| act.second_derivative(v)),
                &trace.masks[l],
            );
            let z_dot_bar = a_dot_bar.component_mul(&slope);
            let z_bar = a_bar.component_mul(&slope)
                + a_dot_bar
                    .component_mul(&curvature)
                    .component_mul(&tangent_pre[l]);

            let a_prev = trace.layer_input(l);
            let a_prev_dot = if l == 0 {
                DVector::from_column_slice(u)
            } else {
                tangent_post[l - 1].clone()
            };
            grads[l].weight = &z_bar * a_prev.transpose() + &z_dot_bar * a_prev_dot.transpose();
            grads[l].bias = z_bar.clone();

            a_bar = self.layers[l].weight.tr_mul(&z_bar);
            a_dot_bar = self.layers[l].weight.tr_mul(&z_dot_bar);
        }

        grads
    }

    /// Energy at `coords`, without dropout.
    pub fn predict(&self, coords: DistancePair) -> f64 {
        self.forward_traced::<rand::rngs::StdRng>(coords, None).value
    }

    /// Energy and `∂V/∂(r12, r23)` at `coords`. Pure with respect to `self`.
    pub fn gradient_of(&self, coords: DistancePair) -> SurfacePoint {
        let trace = self.forward_traced::<rand::rngs::StdRng>(coords, None);
        let g = self.input_gradient(&trace);
        SurfacePoint {
            energy: trace.value,
            gradient: [g[0], g[1]],
        }
    }

    pub fn predict_batch(&self, inputs: &[DistancePair]) -> Vec<f64> {
        #[cfg(not(feature = "parallel"))]
        let iterator = inputs.iter();

        #[cfg(feature = "parallel")]
        let iterator = inputs.par_iter();

        iterator.map(|&coords| self.predict(coords)).collect()
    }
}

impl PotentialSurface for Surrogate {
    fn energy(&self, coords: DistancePair) -> f64 {
        self.predict(coords)
    }

    fn energy_and_gradient(&self, coords: DistancePair) -> SurfacePoint {
        self.gradient_of(coords)
    }
}

#[inline]
fn apply_mask(v: DVector<f64>, mask: &Option<DVector<f64>>) -> DVector<f64> {
    match mask {
        Some(m) => v.component_mul(m),
        None => v,
    }
}
