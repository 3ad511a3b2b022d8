use std::collections::BTreeMap;

use candle_core::{DType, Tensor, Var};
use candle_nn::{Linear, Module, VarBuilder, VarMap, linear};

use crate::{
    device::DEVICE,
    error::{Error, Result},
};

/// Fully connected action-value estimator: ReLU between hidden layers, raw
/// linear output with one component per action.
pub struct MultiLayerPerceptron {
    layers: Vec<Linear>,
    var_map: VarMap,
    topology: Vec<usize>,
}

impl MultiLayerPerceptron {
    /// `topology` lists layer widths from input to output, e.g. `[3, 64, 4]`.
    pub fn new(topology: &[usize]) -> Result<Self> {
        if topology.len() < 2 || topology.contains(&0) {
            return Err(Error::InvalidConfig(format!(
                "network topology {topology:?} needs at least an input and an output layer of non-zero width"
            )));
        }

        let var_map = VarMap::new();
        let vb = VarBuilder::from_varmap(&var_map, DType::F32, &DEVICE);
        let layers = topology
            .windows(2)
            .enumerate()
            .map(|(i, w)| linear(w[0], w[1], vb.pp(i)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            layers,
            var_map,
            topology: topology.to_vec(),
        })
    }

    pub fn output(&self, inputs: &Tensor) -> Result<Tensor> {
        let mut x = inputs.clone();
        let hidden = self.layers.len() - 1;
        for layer in &self.layers[..hidden] {
            x = layer.forward(&x)?.relu()?;
        }
        Ok(self.layers[hidden].forward(&x)?)
    }

    pub fn vars(&self) -> Vec<Var> {
        self.var_map.all_vars()
    }

    pub fn input_dim(&self) -> usize {
        self.topology[0]
    }

    pub fn output_dim(&self) -> usize {
        self.topology[self.topology.len() - 1]
    }

    /// Overwrites every weight and bias with the values held by `source`.
    pub fn copy_from(&self, source: &MultiLayerPerceptron) -> Result<()> {
        if source.topology != self.topology {
            return Err(Error::InvalidConfig(format!(
                "cannot copy a {:?} network into a {:?} network",
                source.topology, self.topology
            )));
        }
        let source_vars = source.var_map.data().lock().map_err(|_| Error::ParameterLock)?;
        let own_vars = self.var_map.data().lock().map_err(|_| Error::ParameterLock)?;
        for (name, source_var) in source_vars.iter() {
            if let Some(own_var) = own_vars.get(name) {
                own_var.set(source_var.as_tensor())?;
            }
        }
        Ok(())
    }

    /// Named, flattened copy of every parameter, ordered by name.
    pub fn parameters(&self) -> Result<BTreeMap<String, Vec<f32>>> {
        let vars = self.var_map.data().lock().map_err(|_| Error::ParameterLock)?;
        vars.iter()
            .map(|(name, var)| {
                let values = var.as_tensor().flatten_all()?.to_vec1::<f32>()?;
                Ok((name.clone(), values))
            })
            .collect()
    }
}
