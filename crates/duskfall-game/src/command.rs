//! Command metadata and the gate every player command passes.
//!
//! The external dispatcher parses chat lines into a [`CommandCall`]. The
//! game looks the name up in its command table, checks the [`CommandSpec`]
//! (phase, role, public or private, number of targets), resolves target
//! nicknames, and only then hands the call to the core or a role module.
//! The same table is exposed through [`Game::command_specs`] so the
//! dispatcher can hide commands a player can't use.

use std::sync::Arc;

use duskfall_protocol::{Notice, PlayerId, Role, Template};
use tracing::debug;

use crate::night::ActionKind;
use crate::roles::Action;
use crate::{Game, GameError, Phase};

/// Where a command may be issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Only in the game channel.
    Public,
    /// Only in a private message.
    Private,
    Either,
}

/// Who may issue a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleGate {
    Anyone,
    /// Any participant, living or dead.
    Participant,
    Alive,
    /// Living holders of one of these roles.
    Roles(&'static [Role]),
    /// Living carriers of a template.
    Template(Template),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub phases: &'static [Phase],
    pub gate: RoleGate,
    pub visibility: Visibility,
    /// Number of player targets taken from the front of the arguments.
    pub targets: usize,
}

/// A parsed command from the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCall {
    pub actor: PlayerId,
    pub name: String,
    pub args: Vec<String>,
    /// Issued in the channel rather than privately.
    pub public: bool,
}

impl CommandCall {
    pub fn new(actor: PlayerId, name: impl Into<String>, args: &[&str], public: bool) -> Self {
        Self {
            actor,
            name: name.into(),
            args: args.iter().map(|a| (*a).to_owned()).collect(),
            public,
        }
    }

    /// A command typed in the channel.
    pub fn public(actor: PlayerId, name: impl Into<String>, args: &[&str]) -> Self {
        Self::new(actor, name, args, true)
    }

    /// A command sent privately.
    pub fn private(actor: PlayerId, name: impl Into<String>, args: &[&str]) -> Self {
        Self::new(actor, name, args, false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    Join,
    Leave,
    Start,
    Vote,
    Unvote,
    Retract,
    Module(usize),
}

const LOBBY: &[Phase] = &[Phase::None, Phase::Join];
const PLAYING: &[Phase] = &[Phase::Join, Phase::Night, Phase::Day];
const NIGHT: &[Phase] = &[Phase::Night];
const DAY: &[Phase] = &[Phase::Day];

pub(crate) fn core_commands() -> [(CommandSpec, Route); 6] {
    [
        (
            CommandSpec {
                name: "join",
                phases: LOBBY,
                gate: RoleGate::Anyone,
                visibility: Visibility::Public,
                targets: 0,
            },
            Route::Join,
        ),
        (
            CommandSpec {
                name: "leave",
                phases: PLAYING,
                gate: RoleGate::Participant,
                visibility: Visibility::Either,
                targets: 0,
            },
            Route::Leave,
        ),
        (
            CommandSpec {
                name: "start",
                phases: &[Phase::Join],
                gate: RoleGate::Participant,
                visibility: Visibility::Public,
                targets: 0,
            },
            Route::Start,
        ),
        (
            CommandSpec {
                name: "vote",
                phases: DAY,
                gate: RoleGate::Alive,
                visibility: Visibility::Public,
                targets: 1,
            },
            Route::Vote,
        ),
        (
            CommandSpec {
                name: "unvote",
                phases: DAY,
                gate: RoleGate::Alive,
                visibility: Visibility::Public,
                targets: 0,
            },
            Route::Unvote,
        ),
        (
            CommandSpec {
                name: "retract",
                phases: NIGHT,
                gate: RoleGate::Alive,
                visibility: Visibility::Private,
                targets: 0,
            },
            Route::Retract,
        ),
    ]
}

impl Game {
    /// Every registered command, core and role modules alike.
    pub fn command_specs(&self) -> Vec<CommandSpec> {
        self.commands.values().map(|(spec, _)| *spec).collect()
    }

    /// Runs a player command.
    ///
    /// A refused command sends the actor a private `Rejected` notice and
    /// returns the error. Nothing changes in that case.
    pub fn command(&mut self, call: CommandCall) -> Result<(), GameError> {
        let result = self.run_command(&call);
        if let Err(err) = &result {
            if !err.is_fatal() {
                debug!(
                    game_id = %self.id,
                    player_id = %call.actor,
                    command = %call.name,
                    error = %err,
                    "command rejected"
                );
                self.tell(call.actor, Notice::rejected(err.to_string()));
            }
        }
        result
    }

    fn run_command(&mut self, call: &CommandCall) -> Result<(), GameError> {
        let (spec, route) = self
            .commands
            .get(call.name.as_str())
            .copied()
            .ok_or_else(|| GameError::rejected(format!("unknown command {}", call.name)))?;

        self.check_gate(&spec, call)?;
        let targets = self.resolve_targets(&spec, &call.args)?;
        self.registry.touch(call.actor);

        match route {
            Route::Join => {
                let nick = call
                    .args
                    .first()
                    .cloned()
                    .unwrap_or_else(|| call.actor.to_string());
                self.join(call.actor, nick)
            }
            Route::Leave => self.leave(call.actor),
            Route::Start => self.start(call.actor),
            Route::Vote => self.cast_vote(call.actor, targets[0]),
            Route::Unvote => self.retract_vote(call.actor),
            Route::Retract => self.retract_actions(call.actor),
            Route::Module(index) => {
                let module = Arc::clone(&self.modules[index]);
                let action = Action {
                    actor: call.actor,
                    command: spec.name,
                    targets,
                };
                match self.phase {
                    Phase::Night => {
                        module.on_night_action(self, &action)?;
                        self.chk_nightdone()
                    }
                    Phase::Day => {
                        module.on_day_action(self, &action)?;
                        self.settle()
                    }
                    phase => Err(GameError::InvalidState(format!(
                        "{} routed during {phase}",
                        spec.name
                    ))),
                }
            }
        }
    }

    fn check_gate(&self, spec: &CommandSpec, call: &CommandCall) -> Result<(), GameError> {
        if !spec.phases.contains(&self.phase) {
            return Err(GameError::rejected(format!(
                "you can't use {} right now",
                spec.name
            )));
        }
        match (spec.visibility, call.public) {
            (Visibility::Public, false) => {
                return Err(GameError::rejected(format!(
                    "use {} in the game channel",
                    spec.name
                )));
            }
            (Visibility::Private, true) => {
                return Err(GameError::rejected(format!(
                    "use {} in a private message",
                    spec.name
                )));
            }
            _ => {}
        }

        let actor = call.actor;
        if spec.gate != RoleGate::Anyone && !self.registry.contains(actor) {
            return Err(GameError::NotInGame(actor, self.id));
        }
        let allowed = match spec.gate {
            RoleGate::Anyone | RoleGate::Participant => true,
            RoleGate::Alive => self.registry.is_alive(actor),
            RoleGate::Roles(roles) => self
                .registry
                .main_role(actor)
                .is_some_and(|r| roles.contains(&r)),
            RoleGate::Template(template) => {
                self.registry.is_alive(actor) && self.registry.has_template(actor, template)
            }
        };
        if !allowed {
            return Err(GameError::rejected(format!("you can't use {}", spec.name)));
        }
        Ok(())
    }

    fn resolve_targets(&self, spec: &CommandSpec, args: &[String]) -> Result<Vec<PlayerId>, GameError> {
        if args.len() < spec.targets {
            return Err(GameError::rejected(format!(
                "{} needs {} target(s)",
                spec.name, spec.targets
            )));
        }
        args.iter()
            .take(spec.targets)
            .map(|arg| self.registry.resolve_target(arg))
            .collect()
    }

    fn retract_actions(&mut self, actor: PlayerId) -> Result<(), GameError> {
        if self.night.records.retract(actor) == 0 {
            return Err(GameError::rejected("you have nothing to retract"));
        }
        self.tell(actor, Notice::ActionRetracted);
        Ok(())
    }

    /// Whether `actor` has recorded `kind` tonight.
    pub fn has_acted(&self, kind: ActionKind, actor: PlayerId) -> bool {
        self.night.records.has_acted(kind, actor)
    }
}
