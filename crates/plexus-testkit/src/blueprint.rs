//! Stack composition
//!
//! A [`StackBlueprint`] lists the layers of a node's stack, outermost first,
//! ending in the base transport. [`attach_interceptor`] derives the testable
//! variant of a blueprint by placing the delay interceptor directly on top of
//! the base, so every message the base receives passes through the stasher
//! before any named layer sees it. The blueprint passed in is left untouched.

use crate::delay::DelayHandle;
use crate::error::{TestkitError, TestkitResult};
use crate::instrumented::Instrumented;
use plexus_stack::NetworkStack;
use std::fmt;
use tracing::debug;

/// One layer of a stack blueprint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Layer {
    /// A caller-provided decorator, identified by name
    Named(String),
    /// The delay interceptor
    Interceptor,
    /// The base transport
    Base,
}

impl Layer {
    /// Named decorator layer
    pub fn named(name: impl Into<String>) -> Self {
        Layer::Named(name.into())
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Named(name) => f.write_str(name),
            Layer::Interceptor => f.write_str("interceptor"),
            Layer::Base => f.write_str("base"),
        }
    }
}

/// Named chain of layers, outermost first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackBlueprint {
    name: String,
    layers: Vec<Layer>,
}

/// Stack built from a blueprint
pub struct AssembledStack {
    /// Outermost layer of the built stack
    pub stack: Box<dyn NetworkStack>,
    /// Delay rules of the interceptor, when the blueprint has one
    pub delays: Option<DelayHandle>,
}

impl fmt::Debug for AssembledStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssembledStack")
            .field("stack", &self.stack.name())
            .field("delays", &self.delays)
            .finish()
    }
}

impl StackBlueprint {
    /// Blueprint holding only the base transport
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layers: vec![Layer::Base],
        }
    }

    /// Blueprint with an explicit layer chain, outermost first
    pub fn from_layers(name: impl Into<String>, layers: Vec<Layer>) -> Self {
        Self {
            name: name.into(),
            layers,
        }
    }

    /// Add a named layer outside every existing one
    pub fn wrap(mut self, layer: impl Into<String>) -> Self {
        self.layers.insert(0, Layer::Named(layer.into()));
        self
    }

    /// Blueprint name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layers, outermost first
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Whether the chain contains the interceptor
    pub fn is_instrumented(&self) -> bool {
        self.layers.contains(&Layer::Interceptor)
    }

    /// Index of the single base layer
    fn base_index(&self) -> TestkitResult<usize> {
        let mut positions = self
            .layers
            .iter()
            .enumerate()
            .filter(|(_, layer)| **layer == Layer::Base)
            .map(|(index, _)| index);
        match (positions.next(), positions.count()) {
            (Some(index), 0) => Ok(index),
            (first, rest) => Err(TestkitError::AmbiguousComposition {
                stack: self.name.clone(),
                occurrences: usize::from(first.is_some()) + rest,
            }),
        }
    }

    /// Build the runtime stack, innermost layer first
    ///
    /// `base` becomes the base layer, the interceptor layer wraps it in
    /// [`Instrumented`], and `decorate` is called once per named layer with
    /// the stack built so far.
    pub fn assemble<B, D>(&self, base: B, mut decorate: D) -> TestkitResult<AssembledStack>
    where
        B: NetworkStack + 'static,
        D: FnMut(&str, Box<dyn NetworkStack>) -> Box<dyn NetworkStack>,
    {
        let base_index = self.base_index()?;
        if let Some(layer) = self.layers.get(base_index + 1) {
            return Err(TestkitError::LayerBelowBase {
                stack: self.name.clone(),
                layer: layer.to_string(),
            });
        }

        let mut stack: Box<dyn NetworkStack> = Box::new(base);
        let mut delays = None;
        for layer in self.layers[..base_index].iter().rev() {
            stack = match layer {
                Layer::Interceptor => {
                    let instrumented = Instrumented::new(stack);
                    delays = Some(instrumented.delays());
                    Box::new(instrumented)
                }
                Layer::Named(name) => decorate(name, stack),
                // only layers above the single base are walked
                Layer::Base => stack,
            };
        }

        debug!(blueprint = %self.name, layers = self.layers.len(), "assembled stack");
        Ok(AssembledStack { stack, delays })
    }
}

/// Testable variant of `blueprint` with the interceptor directly above the base
///
/// Attaching to a blueprint that is already instrumented returns it unchanged;
/// an interceptor found anywhere else in the chain is moved next to the base.
pub fn attach_interceptor(blueprint: &StackBlueprint) -> TestkitResult<StackBlueprint> {
    let base_index = blueprint.base_index()?;
    if base_index > 0 && blueprint.layers[base_index - 1] == Layer::Interceptor {
        debug!(blueprint = %blueprint.name, "interceptor already attached");
        return Ok(blueprint.clone());
    }

    let mut layers: Vec<Layer> = blueprint
        .layers
        .iter()
        .filter(|layer| **layer != Layer::Interceptor)
        .cloned()
        .collect();
    let base_index = layers
        .iter()
        .position(|layer| *layer == Layer::Base)
        .unwrap_or(layers.len());
    layers.insert(base_index, Layer::Interceptor);

    Ok(StackBlueprint {
        name: blueprint.name.clone(),
        layers,
    })
}
