//! Low-level IR data model
//!
//! The abstract operand tuples consumed by the dependence-graph builder and
//! the pointer-state builder. IR parsing proper is out of scope; a module is
//! either constructed programmatically or read from its JSON interchange form
//! via serde.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle of an IR value (an instruction result, a function, or a
/// formal argument). Unique within a module.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ValueId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Control-flow edge kind between basic blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CfgEdgeKind {
    /// Sequential execution (fall-through)
    #[default]
    Sequential,
    /// True branch of conditional
    TrueBranch,
    /// False branch of conditional
    FalseBranch,
}

/// Labelled CFG edge to another block of the same function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfgEdge {
    /// Index of the target block within the function
    pub target: usize,
    /// Edge label
    #[serde(default)]
    pub kind: CfgEdgeKind,
}

impl CfgEdge {
    pub fn to(target: usize) -> Self {
        CfgEdge {
            target,
            kind: CfgEdgeKind::Sequential,
        }
    }
}

/// Instruction payload
///
/// Only the kinds relevant to dependence and pointer analysis are
/// distinguished; everything else is `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstKind {
    /// Stack allocation of `size` bytes
    Alloca { size: u64, zeroed: bool },
    /// Heap allocation of `size` bytes (0 = unknown size)
    DynAlloc { size: u64 },
    /// `*pointer = value`; the value operand may be a constant without a
    /// value handle
    Store {
        pointer: ValueId,
        value: Option<ValueId>,
    },
    /// Read through `pointer`
    Load { pointer: ValueId },
    /// Pointer displacement; `None` means a statically unknown offset
    Gep {
        pointer: ValueId,
        offset: Option<u64>,
    },
    /// Bit-preserving pointer conversion; `source` is the stripped
    /// underlying pointer
    Cast { source: ValueId },
    /// SSA join of the incoming values
    Phi { incoming: Vec<ValueId> },
    /// Direct call; `callee` is the function's own value handle
    Call { callee: ValueId, args: Vec<ValueId> },
    /// Return, possibly void
    Ret { value: Option<ValueId> },
    /// Branch terminator; targets are given by the block's successor edges
    Branch,
    /// Materializes the null pointer constant
    NullPtr,
    /// Copies `len` bytes (`None` = unknown length) from `src` to `dst`
    Memcpy {
        dst: ValueId,
        src: ValueId,
        len: Option<u64>,
    },
    /// Anything without dependence-relevant structure
    Other,
}

impl InstKind {
    /// Whether this instruction legally ends a basic block
    pub fn is_terminator(&self) -> bool {
        matches!(self, InstKind::Ret { .. } | InstKind::Branch)
    }
}

/// A single IR instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// The value this instruction defines (or its handle, for void ops)
    pub value: ValueId,
    /// Payload
    pub kind: InstKind,
    /// Optional human-readable rendering, used for dump labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Instruction {
    pub fn new(value: ValueId, kind: InstKind) -> Self {
        Instruction {
            value,
            kind,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Stable label for dumps; falls back to a rendering of the kind
    pub fn label(&self) -> String {
        if let Some(ref name) = self.name {
            return name.clone();
        }
        match &self.kind {
            InstKind::Alloca { size, .. } => format!("{} = alloca {}", self.value, size),
            InstKind::DynAlloc { size } => format!("{} = dyn_alloc {}", self.value, size),
            InstKind::Store { pointer, value } => match value {
                Some(v) => format!("store {} -> {}", v, pointer),
                None => format!("store <const> -> {}", pointer),
            },
            InstKind::Load { pointer } => format!("{} = load {}", self.value, pointer),
            InstKind::Gep { pointer, offset } => match offset {
                Some(off) => format!("{} = gep {} + {}", self.value, pointer, off),
                None => format!("{} = gep {} + ?", self.value, pointer),
            },
            InstKind::Cast { source } => format!("{} = cast {}", self.value, source),
            InstKind::Phi { incoming } => {
                let ops: Vec<String> = incoming.iter().map(|v| v.to_string()).collect();
                format!("{} = phi [{}]", self.value, ops.join(", "))
            }
            InstKind::Call { callee, args } => {
                let ops: Vec<String> = args.iter().map(|v| v.to_string()).collect();
                format!("{} = call {}({})", self.value, callee, ops.join(", "))
            }
            InstKind::Ret { value } => match value {
                Some(v) => format!("ret {}", v),
                None => "ret void".to_string(),
            },
            InstKind::Branch => "br".to_string(),
            InstKind::NullPtr => format!("{} = null", self.value),
            InstKind::Memcpy { dst, src, len } => match len {
                Some(l) => format!("memcpy {} <- {} [{}]", dst, src, l),
                None => format!("memcpy {} <- {} [?]", dst, src),
            },
            InstKind::Other => format!("{} = op", self.value),
        }
    }
}

/// Ordered, non-empty basic block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    /// Instructions in source order; the last one must be a terminator
    pub instructions: Vec<Instruction>,
    /// Labelled successor edges
    #[serde(default)]
    pub successors: Vec<CfgEdge>,
}

impl Block {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Block {
            instructions,
            successors: Vec::new(),
        }
    }

    pub fn with_successors(mut self, successors: Vec<CfgEdge>) -> Self {
        self.successors = successors;
        self
    }

    /// Terminator of the block, if the block is well formed
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|i| i.kind.is_terminator())
    }
}

/// A function: its own value handle, formal arguments, and basic blocks
///
/// A function with no blocks is a declaration; calls to it are skipped by
/// the builders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    /// The function's own value handle (key of its entry node)
    pub value: ValueId,
    /// Formal argument value handles
    #[serde(default)]
    pub params: Vec<ValueId>,
    /// Basic blocks; index 0 is the entry block
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Function {
    /// Whether the function has a body
    pub fn is_defined(&self) -> bool {
        !self.blocks.is_empty()
    }
}

/// A compiled IR module: a list of functions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(functions: Vec<Function>) -> Self {
        Module { functions }
    }

    /// Look up a function by name
    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Look up a function by its value handle
    pub fn function_by_value(&self, value: ValueId) -> Option<&Function> {
        self.functions.iter().find(|f| f.value == value)
    }

    /// Largest value handle used anywhere in the module
    ///
    /// Synthetic values (the phony unified return) are minted above this.
    pub fn max_value_id(&self) -> u32 {
        let mut max = 0;
        for f in &self.functions {
            max = max.max(f.value.0);
            for p in &f.params {
                max = max.max(p.0);
            }
            for b in &f.blocks {
                for i in &b.instructions {
                    max = max.max(i.value.0);
                }
            }
        }
        max
    }

    /// Read a module from its JSON interchange form
    pub fn from_json(data: &str) -> crate::errors::Result<Module> {
        Ok(serde_json::from_str(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminator_detection() {
        let ret = Instruction::new(ValueId(1), InstKind::Ret { value: None });
        let load = Instruction::new(
            ValueId(2),
            InstKind::Load {
                pointer: ValueId(1),
            },
        );
        assert!(ret.kind.is_terminator());
        assert!(!load.kind.is_terminator());

        let block = Block::new(vec![load, ret]);
        assert!(block.terminator().is_some());

        let bad = Block::new(vec![Instruction::new(
            ValueId(3),
            InstKind::Load {
                pointer: ValueId(1),
            },
        )]);
        assert!(bad.terminator().is_none());
    }

    #[test]
    fn max_value_id_covers_params_and_instructions() {
        let f = Function {
            name: "f".into(),
            value: ValueId(1),
            params: vec![ValueId(9)],
            blocks: vec![Block::new(vec![Instruction::new(
                ValueId(4),
                InstKind::Ret { value: None },
            )])],
        };
        assert_eq!(Module::new(vec![f]).max_value_id(), 9);
    }

    #[test]
    fn labels_render_operands() {
        let i = Instruction::new(
            ValueId(5),
            InstKind::Gep {
                pointer: ValueId(2),
                offset: Some(8),
            },
        );
        assert_eq!(i.label(), "%5 = gep %2 + 8");
        assert_eq!(i.with_name("custom").label(), "custom");
    }
}
