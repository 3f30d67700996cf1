//! Construction-time pass over a scene's scripts, run once before the first
//! tick to size the cube variable bank and list the game variables in use.

use std::collections::BTreeSet;

use super::ops::{Command, Operand};
use super::program::ScriptProgram;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VariableRef {
    Cube(u16),
    Game(u16),
}

fn visit_variable_refs(commands: &[Command], visit: &mut impl FnMut(VariableRef)) {
    for command in commands {
        match command {
            Command::SetVarCube { index, .. } => visit(VariableRef::Cube(*index)),
            Command::SetVarGame { index, .. } => visit(VariableRef::Game(*index)),
            _ => {}
        }
        if let Some(condition) = command.condition() {
            condition.visit_operands(&mut |operand| match operand {
                Operand::VarCube(index) => visit(VariableRef::Cube(*index)),
                Operand::VarGame(index) => visit(VariableRef::Game(*index)),
                _ => {}
            });
        }
    }
}

/// One past the highest cube variable referenced, or 0 when none is.
pub fn cube_variable_len<'a>(programs: impl IntoIterator<Item = &'a ScriptProgram>) -> usize {
    let mut len = 0usize;
    for program in programs {
        visit_variable_refs(program.commands(), &mut |var| {
            if let VariableRef::Cube(index) = var {
                len = len.max(usize::from(index) + 1);
            }
        });
    }
    len
}

/// Sorted, deduplicated game variable indices referenced by the scripts.
pub fn referenced_game_variables<'a>(
    programs: impl IntoIterator<Item = &'a ScriptProgram>,
) -> Vec<u16> {
    let mut used = BTreeSet::new();
    for program in programs {
        visit_variable_refs(program.commands(), &mut |var| {
            if let VariableRef::Game(index) = var {
                used.insert(index);
            }
        });
    }
    used.into_iter().collect()
}
