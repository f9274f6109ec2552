#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
    pub arg_key: &'static str,
}

pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "model",
        action: "set_model",
        arg_key: "model",
    },
    CommandSpec {
        command: "key",
        action: "set_api_key",
        arg_key: "api_key",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "face",
    action: "set_face",
    arg_key: "path",
}];

pub(crate) const MULTI_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "closet",
    action: "set_closet",
    arg_key: "paths",
}];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "clear",
        action: "clear_history",
        arg_key: "",
    },
    CommandSpec {
        command: "sync",
        action: "sync_now",
        arg_key: "",
    },
    CommandSpec {
        command: "history",
        action: "history",
        arg_key: "",
    },
    CommandSpec {
        command: "models",
        action: "list_models",
        arg_key: "",
    },
    CommandSpec {
        command: "help",
        action: "help",
        arg_key: "",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/closet",
    "/face",
    "/sync",
    "/clear",
    "/history",
    "/model",
    "/models",
    "/key",
    "/help",
];
