//! The instruction catalog is an explicit external collaborator: machine-
//! and assembler-instruction tables (mnemonics, operand formats, lengths)
//! are out of this crate's scope. The pipeline
//! only needs to know an opcode's tag and rough operand shape, which this
//! trait boundary supplies; the host supplies a real implementation keyed
//! off whatever instruction set table it maintains.

use super::{OpcodeTag, OperandForm};

/// What the pipeline needs to know about an opcode to dispatch parsing and
/// attribute computation; everything about how the instruction actually
/// assembles is the host's problem.
#[derive(Clone, Debug)]
pub struct InstructionInfo {
    pub tag: OpcodeTag,
    pub operand_form: OperandForm,
    /// Length in bytes the instruction reserves for `L'` attribute
    /// purposes, when fixed and known without examining operands.
    pub fixed_length: Option<u32>,
}

pub trait InstructionCatalog {
    fn lookup(&self, mnemonic: &str) -> Option<InstructionInfo>;
}

/// A tiny catalog covering a handful of well-known mnemonics, useful for
/// unit tests and the CLI's `check-config` smoke path. Not meant to stand
/// in for a real instruction set.
#[derive(Default)]
pub struct BuiltinCatalog;

impl InstructionCatalog for BuiltinCatalog {
    fn lookup(&self, mnemonic: &str) -> Option<InstructionInfo> {
        let (tag, form, len) = match mnemonic.to_ascii_uppercase().as_str() {
            "MVC" | "MVI" | "LA" | "L" | "ST" | "LR" | "BR" | "BC" | "CLC" => {
                (OpcodeTag::MachineInstr, OperandForm::Machine, None)
            }
            "DC" | "DS" | "EQU" | "CSECT" | "DSECT" | "USING" | "DROP" | "OPSYN" | "ICTL" | "END" | "COPY" | "MNOTE" => {
                (OpcodeTag::AsmInstr, OperandForm::Asm, None)
            }
            "AIF" | "AGO" => (OpcodeTag::CaInstr, OperandForm::CaBranch, None),
            "SETA" | "SETB" | "SETC" => (OpcodeTag::CaInstr, OperandForm::CaExpr, None),
            "LCLA" | "LCLB" | "LCLC" | "GBLA" | "GBLB" | "GBLC" => {
                (OpcodeTag::CaInstr, OperandForm::CaVarDef, None)
            }
            "MACRO" | "MEND" | "MEXIT" => (OpcodeTag::AsmInstr, OperandForm::NoOp, None),
            "AREAD" => (OpcodeTag::CaInstr, OperandForm::NoOp, None),
            _ => return None,
        };
        Some(InstructionInfo { tag, operand_form: form, fixed_length: len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_knows_a_machine_instruction() {
        let c = BuiltinCatalog;
        let info = c.lookup("MVC").unwrap();
        assert_eq!(info.tag, OpcodeTag::MachineInstr);
    }

    #[test]
    fn builtin_catalog_is_case_insensitive() {
        let c = BuiltinCatalog;
        assert!(c.lookup("mvc").is_some());
    }

    #[test]
    fn unknown_mnemonic_is_none() {
        let c = BuiltinCatalog;
        assert!(c.lookup("ZZZNOTREAL").is_none());
    }
}
