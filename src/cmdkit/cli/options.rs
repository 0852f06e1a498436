use cmdkit::coerce::OptionType;
use cmdkit::{logging, ProgramBuilder, Result};
use serde_json::json;

pub mod names {
    pub const VERSION: &str = "version";
    pub const VERBOSE: &str = "verbose";
    pub const COLOR: &str = "color";
    pub const CONFIG: &str = "config";
    pub const LIMIT: &str = "limit";
    pub const MAX: &str = "max";
    pub const ACTION: &str = "action";
    pub const INFO: &str = "info";
    pub const SEMVER: &str = "semver";
    pub const OVERWRITE: &str = "overwrite";
    pub const SAVE: &str = "save";
    pub const PROGRESS: &str = "progress";
}

pub mod group {
    pub const QUERY: &str = "query";
    pub const SUPPORT: &str = "support";
    pub const HELP: &str = "help";
}

pub const DEFAULT_CONFIG: &str = "cmdkit.json";

pub fn define(builder: &mut ProgramBuilder) -> Result<()> {
    builder
        .define_option(|opt| {
            opt.name = names::VERSION.into();
            opt.short = Some('V');
            opt.description = "display version information".into();
            opt.kind = OptionType::Flag;
            opt.command = Some("version".into());
            opt.global = true;
        })?
        .define_option(|opt| {
            opt.name = names::VERBOSE.into();
            opt.short = Some('v');
            opt.description = "log engine decisions to stderr".into();
            opt.kind = OptionType::Flag;
            opt.global = true;
            opt.on_apply(|value, _ctx| {
                logging::init(u8::from(value.as_bool() == Some(true)));
                Ok(())
            });
        })?
        .define_option(|opt| {
            opt.name = names::COLOR.into();
            opt.description = "output style".into();
            opt.placeholder = Some("name".into());
            opt.enum_values = vec![json!("no"), json!("plain"), json!("ansi")];
            opt.global = true;
            opt.on_apply(|value, ctx| {
                ctx.out_mut().set_color(value.as_str() == Some("ansi"));
                Ok(())
            });
        })?
        .define_option(|opt| {
            opt.name = names::CONFIG.into();
            opt.description = "path to config file".into();
            opt.placeholder = Some("path".into());
            opt.default = Some(json!(DEFAULT_CONFIG));
        })?
        .define_option(|opt| {
            opt.name = names::LIMIT.into();
            opt.description = "show at most this many results".into();
            opt.placeholder = Some("num".into());
            opt.kind = OptionType::Int;
            opt.default = Some(json!(10));
            opt.note = vec!["zero shows everything".into()];
        })?
        .define_option(|opt| {
            opt.name = names::MAX.into();
            opt.description = "fail when more packages match".into();
            opt.placeholder = Some("num".into());
            opt.kind = OptionType::Int;
            opt.default = Some(json!(0));
        })?
        .define_option(|opt| {
            opt.name = names::ACTION.into();
            opt.short = Some('a');
            opt.description = "run action on selection".into();
            opt.placeholder = Some("name".into());
            opt.enum_values = vec![json!("install")];
        })?
        .define_option(|opt| {
            opt.name = names::INFO.into();
            opt.description = "show package summary".into();
            opt.kind = OptionType::Flag;
        })?
        .define_option(|opt| {
            opt.name = names::SEMVER.into();
            opt.description = "match versions starting with prefix".into();
            opt.placeholder = Some("prefix".into());
        })?
        .define_option(|opt| {
            opt.name = names::OVERWRITE.into();
            opt.description = "overwrite existing files".into();
            opt.kind = OptionType::Flag;
        })?
        .define_option(|opt| {
            opt.name = names::SAVE.into();
            opt.description = "record installs in config".into();
            opt.kind = OptionType::Flag;
        })?
        .define_option(|opt| {
            opt.name = names::PROGRESS.into();
            opt.description = "print progress notes".into();
            opt.kind = OptionType::Flag;
            opt.global = true;
        })?;
    Ok(())
}
