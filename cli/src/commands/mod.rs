mod helpers;
mod history;
mod reading;
mod settings;
mod trends;

pub(crate) use history::{cmd_dashboard, cmd_history};
pub(crate) use reading::{cmd_delete, cmd_edit, cmd_log, cmd_photo};
pub(crate) use settings::{
    cmd_settings_language, cmd_settings_name, cmd_settings_show, cmd_settings_target,
    cmd_settings_unit,
};
pub(crate) use trends::cmd_trends;
