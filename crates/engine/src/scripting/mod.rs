mod interpreter;
mod ops;
mod program;
mod scan;
mod variables;

pub use interpreter::{
    run_scene_tick, ScriptContext, ScriptEvent, ScriptKind, TickSummary, TraceStep,
    DEFAULT_STEP_BUDGET,
};
pub use ops::{ActorRef, Command, Comparison, Condition, Operand};
pub use program::{Script, ScriptError, ScriptProgram, ScriptState, ScriptStatus};
pub use scan::{cube_variable_len, referenced_game_variables};
pub use variables::{GameVariables, SceneVariables, GAME_VARIABLE_COUNT};
