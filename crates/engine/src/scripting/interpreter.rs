use tracing::{debug, warn};

use crate::app::{ActorAnimator, SpatialGraph};
use crate::content::SceneIndex;
use crate::scene::{ActorIndex, ActorRegistry, PointRegistry, ZoneRegistry};

use super::ops::{ActorRef, Command, Condition, Operand};
use super::program::{Script, ScriptState, ScriptStatus};
use super::variables::{GameVariables, SceneVariables};

/// Instructions one script may execute in a single tick before it is parked.
pub const DEFAULT_STEP_BUDGET: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    Life,
    Move,
}

/// One executed instruction, recorded when a trace buffer is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceStep {
    pub actor: ActorIndex,
    pub kind: ScriptKind,
    pub ip: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptEvent {
    ActorKilled { actor: ActorIndex, by: ActorIndex },
    ActorRevived { actor: ActorIndex, by: ActorIndex },
    SceneChangeRequested { index: SceneIndex, by: ActorIndex },
}

/// Everything a tick of scripts can read or mutate. The game bank is passed in
/// by the session owner; nothing here is global.
pub struct ScriptContext<'a> {
    pub scene: SceneIndex,
    pub cube_vars: &'a mut SceneVariables,
    pub game_vars: &'a mut GameVariables,
    pub actors: &'a mut ActorRegistry,
    pub zones: &'a mut ZoneRegistry,
    pub points: &'a PointRegistry,
    pub graph: &'a mut dyn SpatialGraph,
    pub animator: &'a mut dyn ActorAnimator,
    pub step_budget: usize,
    pub trace: Option<&'a mut Vec<TraceStep>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub commands_executed: usize,
    pub events: Vec<ScriptEvent>,
}

/// Runs the life then move script of every alive actor, in load order.
pub fn run_scene_tick(ctx: &mut ScriptContext<'_>) -> TickSummary {
    let mut run = TickRun {
        ctx,
        summary: TickSummary::default(),
    };
    for position in 0..run.ctx.actors.len() {
        let actor = ActorIndex(position);
        for kind in [ScriptKind::Life, ScriptKind::Move] {
            if !run.is_alive(actor) {
                break;
            }
            run.run_script(actor, kind);
        }
    }
    run.summary
}

enum Flow {
    Next,
    JumpTo(usize),
    EndTick { resume: usize },
    Halt,
    /// The running actor killed itself.
    Suspended,
}

struct TickRun<'r, 'a> {
    ctx: &'r mut ScriptContext<'a>,
    summary: TickSummary,
}

impl TickRun<'_, '_> {
    fn is_alive(&self, actor: ActorIndex) -> bool {
        self.ctx
            .actors
            .get(actor)
            .is_some_and(|actor| actor.is_alive())
    }

    fn run_script(&mut self, actor: ActorIndex, kind: ScriptKind) {
        // The script leaves its slot while it runs so the actor itself stays
        // addressable by its own commands.
        let mut script = match self.ctx.actors.get_mut(actor) {
            Some(slot) if slot.script(kind).status() == ScriptStatus::Running => {
                std::mem::take(slot.script_mut(kind))
            }
            _ => return,
        };

        let Script { program, state } = &mut script;
        let mut steps = 0usize;
        loop {
            let ip = state.ip;
            let Some(command) = program.commands().get(ip) else {
                state.status = ScriptStatus::Halted;
                debug!(scene = %self.ctx.scene, actor = %actor, script = ?kind, "script_halted");
                break;
            };
            if steps >= self.ctx.step_budget {
                warn!(
                    scene = %self.ctx.scene,
                    actor = %actor,
                    script = ?kind,
                    ip,
                    budget = self.ctx.step_budget,
                    "script_step_budget_exhausted"
                );
                break;
            }
            steps += 1;
            if let Some(trace) = self.ctx.trace.as_deref_mut() {
                trace.push(TraceStep { actor, kind, ip });
            }

            match self.execute(actor, state, ip, command) {
                Flow::Next => state.ip = ip + 1,
                Flow::JumpTo(target) => state.ip = target,
                Flow::EndTick { resume } => {
                    state.ip = resume;
                    break;
                }
                Flow::Halt => {
                    state.status = ScriptStatus::Halted;
                    break;
                }
                Flow::Suspended => {
                    state.ip = ip + 1;
                    break;
                }
            }
        }

        self.summary.commands_executed += steps;
        if let Some(slot) = self.ctx.actors.get_mut(actor) {
            *slot.script_mut(kind) = script;
        }
    }

    fn execute(
        &mut self,
        actor: ActorIndex,
        state: &mut ScriptState,
        ip: usize,
        command: &Command,
    ) -> Flow {
        match command {
            Command::If {
                condition,
                else_target,
            } => {
                if self.evaluate(actor, condition) {
                    Flow::Next
                } else {
                    Flow::JumpTo(*else_target)
                }
            }
            Command::OneIf {
                condition,
                else_target,
            } => {
                let value = self.evaluate(actor, condition);
                let spent = &mut state.one_if_spent[ip];
                if value && !*spent {
                    *spent = true;
                    Flow::Next
                } else {
                    Flow::JumpTo(*else_target)
                }
            }
            Command::SwitchIf {
                condition,
                else_target,
            } => {
                let value = self.evaluate(actor, condition);
                let last = std::mem::replace(&mut state.switch_if_last[ip], value);
                if value && !last {
                    Flow::Next
                } else {
                    Flow::JumpTo(*else_target)
                }
            }
            Command::Jump { target } => Flow::JumpTo(*target),
            Command::Yield => Flow::EndTick { resume: ip + 1 },
            Command::Restart => Flow::EndTick { resume: 0 },
            Command::Stop => Flow::Halt,
            Command::SetVarCube { index, value } => {
                self.ctx.cube_vars.write(*index, *value);
                Flow::Next
            }
            Command::SetVarGame { index, value } => {
                self.ctx.game_vars.write(*index, *value);
                Flow::Next
            }
            Command::Kill { actor: target } => {
                let target = resolve(actor, *target);
                let ctx = &mut *self.ctx;
                match ctx.actors.get_mut(target) {
                    Some(slot) => {
                        if slot.kill(ctx.graph) {
                            self.summary.events.push(ScriptEvent::ActorKilled {
                                actor: target,
                                by: actor,
                            });
                        }
                    }
                    None => self.warn_missing_actor(actor, target, command),
                }
                if target == actor {
                    Flow::Suspended
                } else {
                    Flow::Next
                }
            }
            Command::Revive { actor: target } => {
                let target = resolve(actor, *target);
                let ctx = &mut *self.ctx;
                match ctx.actors.get_mut(target) {
                    Some(slot) => {
                        if slot.revive(ctx.graph) {
                            self.summary.events.push(ScriptEvent::ActorRevived {
                                actor: target,
                                by: actor,
                            });
                        }
                    }
                    None => self.warn_missing_actor(actor, target, command),
                }
                Flow::Next
            }
            Command::SetBehaviour { behaviour } => {
                if let Some(slot) = self.ctx.actors.get_mut(actor) {
                    slot.behaviour = *behaviour;
                }
                self.ctx
                    .animator
                    .set_behaviour(self.ctx.scene, actor, *behaviour);
                Flow::Next
            }
            Command::PlayAnim { anim } => {
                if let Some(slot) = self.ctx.actors.get_mut(actor) {
                    slot.anim = *anim;
                }
                self.ctx.animator.play_anim(self.ctx.scene, actor, *anim);
                Flow::Next
            }
            Command::SetPosition { position } => {
                let ctx = &mut *self.ctx;
                if let Some(slot) = ctx.actors.get_mut(actor) {
                    slot.move_to(*position, ctx.graph);
                }
                Flow::Next
            }
            Command::MoveToPoint { point } => {
                let ctx = &mut *self.ctx;
                match ctx.points.get(*point) {
                    Some(anchor) => {
                        if let Some(slot) = ctx.actors.get_mut(actor) {
                            slot.move_to(anchor.position(), ctx.graph);
                        }
                    }
                    None => warn!(
                        scene = %ctx.scene,
                        actor = %actor,
                        point,
                        "script_point_missing"
                    ),
                }
                Flow::Next
            }
            Command::ChangeScene { index } => {
                self.summary.events.push(ScriptEvent::SceneChangeRequested {
                    index: *index,
                    by: actor,
                });
                Flow::EndTick { resume: ip + 1 }
            }
        }
    }

    // Both sides of AND/OR are always evaluated: operand reads have side
    // effects (trigger consumption, game variable tracking).
    fn evaluate(&mut self, actor: ActorIndex, condition: &Condition) -> bool {
        match condition {
            Condition::Compare { lhs, test, rhs } => {
                let lhs = self.operand(actor, lhs);
                let rhs = self.operand(actor, rhs);
                test.apply(lhs, rhs)
            }
            Condition::Not { term } => !self.evaluate(actor, term),
            Condition::And { lhs, rhs } => {
                let lhs = self.evaluate(actor, lhs);
                let rhs = self.evaluate(actor, rhs);
                lhs && rhs
            }
            Condition::Or { lhs, rhs } => {
                let lhs = self.evaluate(actor, lhs);
                let rhs = self.evaluate(actor, rhs);
                lhs || rhs
            }
        }
    }

    fn operand(&mut self, actor: ActorIndex, operand: &Operand) -> i32 {
        match *operand {
            Operand::Literal(value) => value,
            Operand::VarCube(index) => self.ctx.cube_vars.read(index),
            Operand::VarGame(index) => self.ctx.game_vars.read(index),
            Operand::ZoneEntered(zone) => match self.ctx.zones.get(zone) {
                Some(zone) => i32::from(zone.state().entered),
                None => self.missing_zone(actor, zone),
            },
            Operand::ZoneTriggered(zone) => match self.ctx.zones.get_mut(zone) {
                Some(zone) => i32::from(zone.take_trigger()),
                None => self.missing_zone(actor, zone),
            },
            Operand::ActorAlive(target) => self
                .ctx
                .actors
                .get(resolve(actor, target))
                .map_or(0, |slot| i32::from(slot.is_alive())),
            Operand::ActorBehaviour(target) => self
                .ctx
                .actors
                .get(resolve(actor, target))
                .map_or(0, |slot| i32::from(slot.behaviour)),
            Operand::ActorAnim(target) => self
                .ctx
                .actors
                .get(resolve(actor, target))
                .map_or(0, |slot| i32::from(slot.anim)),
        }
    }

    fn missing_zone(&self, actor: ActorIndex, zone: usize) -> i32 {
        warn!(scene = %self.ctx.scene, actor = %actor, zone, "script_zone_missing");
        0
    }

    fn warn_missing_actor(&self, actor: ActorIndex, target: ActorIndex, command: &Command) {
        warn!(
            scene = %self.ctx.scene,
            actor = %actor,
            target = %target,
            command = command.name(),
            "script_actor_missing"
        );
    }
}

fn resolve(actor: ActorIndex, target: ActorRef) -> ActorIndex {
    match target {
        ActorRef::This => actor,
        ActorRef::Index(index) => ActorIndex(index),
    }
}
