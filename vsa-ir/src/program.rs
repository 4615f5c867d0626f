//! The persisted program: modules, functions, and their CFGs.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use crate::callgraph::CallGraph;
use crate::cfg::Cfg;
use crate::module::Module;
use crate::wto::Wto;
use vsa_types::ProgramCounter;

/// One discovered function: its entry address, owning module, CFG, and WTO.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub address: ProgramCounter,
    pub module: String,
    pub cfg: Cfg,
    pub wto: Wto,
}

/// The full persisted unit of analysis input: every loaded module, every
/// discovered function, and the call graph between them.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prog {
    pub modules: Vec<Module>,
    pub functions: Vec<Function>,
    pub call_graph: CallGraph,
}

impl Prog {
    pub fn function_at(&self, address: ProgramCounter) -> Option<&Function> {
        self.functions.iter().find(|f| f.address == address)
    }

    pub fn function_named(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn module_named(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }
}
