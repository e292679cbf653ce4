//! The fixed opcode → (mnemonic, operand shape) dispatch table.
//!
//! Only the branch-producing opcodes and the string/token/choice opcodes
//! named in the format notes have a fixed, externally-observed operand
//! shape; everything else here is a representative plain-immediate opcode
//! set covering the remaining [`Field`] kinds the walker supports.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Unconditional,
    OnInput,
    RightClick,
    GoSub,
    ExitMenu,
    LoadMenu,
    RepeatMenu,
    RegVsImmediate,
    RegVsRegister,
    LastReadComparison,
    BufferPropertyTest,
    BitmaskTest,
}

/// A field read ahead of a jump instruction's branch target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    U8,
    U16,
    U32,
}

#[derive(Debug, Clone, Copy)]
pub enum Operand {
    None,
    U8,
    U16,
    S16,
    U32,
    PairList,
    DwordArray,
    DisplayText,
    TokenText,
    ChoiceText3e,
    ChoiceText69,
    Jump(JumpKind, &'static [Field]),
}

#[derive(Debug, Clone, Copy)]
pub struct OpcodeDef {
    pub mnemonic: &'static str,
    pub operand: Operand,
}

const fn def(mnemonic: &'static str, operand: Operand) -> OpcodeDef {
    OpcodeDef { mnemonic, operand }
}

/// Looks up the definition for `opcode`, or `None` for an opcode this table
/// does not recognize (the walker emits `UNKNOWN_OPCODE` and stops there).
pub fn lookup(opcode: u8) -> Option<OpcodeDef> {
    Some(match opcode {
        0x00 => def("NOP", Operand::None),
        0x05 => def("SET_FLAG", Operand::U8),
        0x08 => def("WAIT", Operand::U16),
        0x0A => def("SET_REG", Operand::U32),
        0x0B => def("SET_REG16", Operand::S16),

        0x14 => def("JUMP_TO", Operand::Jump(JumpKind::Unconditional, &[])),
        0x15 => def("ON_INPUT", Operand::Jump(JumpKind::OnInput, &[])),
        0x16 => def("ON_RIGHT_CLICK", Operand::Jump(JumpKind::RightClick, &[])),
        0x17 => def("GO_SUB", Operand::Jump(JumpKind::GoSub, &[])),

        0x21 => def("DISPLAY_TEXT", Operand::DisplayText),
        0x24 => def("SET_TEXT_TOKEN", Operand::TokenText),

        0x30 => def("MENU_EXIT_TO", Operand::Jump(JumpKind::ExitMenu, &[])),
        0x31 => def("MENU_LOAD_TO", Operand::Jump(JumpKind::LoadMenu, &[])),
        0x32 => def("MENU_REPEAT_TO", Operand::Jump(JumpKind::RepeatMenu, &[])),

        0x3E => def("CHOICE_TEXT", Operand::ChoiceText3e),

        0x40 => def(
            "CMP_REG_IMM_JUMP",
            Operand::Jump(JumpKind::RegVsImmediate, &[Field::U8, Field::U32]),
        ),
        0x41 => def(
            "CMP_REG_REG_JUMP",
            Operand::Jump(JumpKind::RegVsRegister, &[Field::U8, Field::U8]),
        ),
        0x42 => def(
            "CMP_LASTREAD_JUMP",
            Operand::Jump(JumpKind::LastReadComparison, &[]),
        ),
        0x43 => def(
            "TEST_BUFFER_PROP_JUMP",
            Operand::Jump(JumpKind::BufferPropertyTest, &[Field::U8]),
        ),
        0x44 => def(
            "TEST_BITMASK_JUMP",
            Operand::Jump(JumpKind::BitmaskTest, &[Field::U32]),
        ),

        0x50 => def("SET_TABLE", Operand::PairList),
        0x51 => def("SET_ARRAY", Operand::DwordArray),

        0x69 => def("CHOICE_TEXT_ADDR", Operand::ChoiceText69),

        _ => return None,
    })
}
