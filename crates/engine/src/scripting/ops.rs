use serde::{Deserialize, Serialize};

use crate::app::Vec3;
use crate::content::SceneIndex;

/// Actor addressed by a command or operand, relative to the running actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorRef {
    #[serde(rename = "SELF")]
    This,
    #[serde(rename = "ACTOR")]
    Index(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operand {
    Literal(i32),
    VarCube(u16),
    VarGame(u16),
    /// 1 while the protagonist is inside the zone.
    ZoneEntered(usize),
    /// 1 once per entry; reading consumes the pending trigger.
    ZoneTriggered(usize),
    ActorAlive(ActorRef),
    ActorBehaviour(ActorRef),
    ActorAnim(ActorRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    pub fn apply(self, lhs: i32, rhs: i32) -> bool {
        match self {
            Comparison::Eq => lhs == rhs,
            Comparison::Ne => lhs != rhs,
            Comparison::Lt => lhs < rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Ge => lhs >= rhs,
        }
    }
}

/// Condition tree. Every node is evaluated, including both sides of `AND`/`OR`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Condition {
    Compare {
        lhs: Operand,
        test: Comparison,
        rhs: Operand,
    },
    Not {
        term: Box<Condition>,
    },
    And {
        lhs: Box<Condition>,
        rhs: Box<Condition>,
    },
    Or {
        lhs: Box<Condition>,
        rhs: Box<Condition>,
    },
}

impl Condition {
    pub fn visit_operands(&self, visit: &mut impl FnMut(&Operand)) {
        match self {
            Condition::Compare { lhs, rhs, .. } => {
                visit(lhs);
                visit(rhs);
            }
            Condition::Not { term } => term.visit_operands(visit),
            Condition::And { lhs, rhs } | Condition::Or { lhs, rhs } => {
                lhs.visit_operands(visit);
                rhs.visit_operands(visit);
            }
        }
    }
}

/// Closed instruction set of life and move scripts. Jump targets are command
/// indices within the same script; a target equal to the script length means
/// "past the end".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    If {
        condition: Condition,
        else_target: usize,
    },
    OneIf {
        condition: Condition,
        else_target: usize,
    },
    SwitchIf {
        condition: Condition,
        else_target: usize,
    },
    Jump {
        target: usize,
    },
    Yield,
    Restart,
    Stop,
    SetVarCube {
        index: u16,
        value: i32,
    },
    SetVarGame {
        index: u16,
        value: i32,
    },
    Kill {
        actor: ActorRef,
    },
    Revive {
        actor: ActorRef,
    },
    SetBehaviour {
        behaviour: u8,
    },
    PlayAnim {
        anim: u16,
    },
    SetPosition {
        position: Vec3,
    },
    MoveToPoint {
        point: usize,
    },
    ChangeScene {
        index: SceneIndex,
    },
}

impl Command {
    pub fn condition(&self) -> Option<&Condition> {
        match self {
            Command::If { condition, .. }
            | Command::OneIf { condition, .. }
            | Command::SwitchIf { condition, .. } => Some(condition),
            _ => None,
        }
    }

    pub fn jump_target(&self) -> Option<usize> {
        match self {
            Command::If { else_target, .. }
            | Command::OneIf { else_target, .. }
            | Command::SwitchIf { else_target, .. } => Some(*else_target),
            Command::Jump { target } => Some(*target),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::If { .. } => "IF",
            Command::OneIf { .. } => "ONE_IF",
            Command::SwitchIf { .. } => "SWITCH_IF",
            Command::Jump { .. } => "JUMP",
            Command::Yield => "YIELD",
            Command::Restart => "RESTART",
            Command::Stop => "STOP",
            Command::SetVarCube { .. } => "SET_VAR_CUBE",
            Command::SetVarGame { .. } => "SET_VAR_GAME",
            Command::Kill { .. } => "KILL",
            Command::Revive { .. } => "REVIVE",
            Command::SetBehaviour { .. } => "SET_BEHAVIOUR",
            Command::PlayAnim { .. } => "PLAY_ANIM",
            Command::SetPosition { .. } => "SET_POSITION",
            Command::MoveToPoint { .. } => "MOVE_TO_POINT",
            Command::ChangeScene { .. } => "CHANGE_SCENE",
        }
    }
}
