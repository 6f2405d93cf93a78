/// Top-level metadata key holding the init document.
pub const INIT_KEY: &str = "AWS::CloudFormation::Init";

/// Section applied when the init document declares no configSets.
pub const DEFAULT_SECTION: &str = "config";

/// ConfigSet used when configSets exist but none was selected.
pub const DEFAULT_CONFIGSET: &str = "default";

/// Key of the configSet table inside the init document.
pub const CONFIGSETS_KEY: &str = "configSets";

/// Default on-disk metadata document written at boot by the provisioning layer.
pub const INIT_DATA_FILENAME: &str = "cfn-init-data";

/// Last applied metadata snapshot.
pub const LAST_METADATA_FILENAME: &str = "last_metadata";

/// cfn-hup main configuration file.
pub const HUP_CONFIG_FILENAME: &str = "cfn-hup.conf";

/// cfn-hup hooks file.
pub const HOOKS_FILENAME: &str = "hooks.conf";

/// Directory of additional hook files.
pub const HOOKS_DIRNAME: &str = "hooks.d";

/// Exit status reported when a command could not drop to its run-as user.
pub const PRIVILEGE_FAILURE_STATUS: i32 = 126;

/// Login shell given to every created user.
pub const NOLOGIN_SHELL: &str = "/sbin/nologin";

/// Events fired to hooks.
pub const EVENT_POST_UPDATE: &str = "post.update";
pub const EVENT_SERVICE_RESTARTED: &str = "service.restarted";
