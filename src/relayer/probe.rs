use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use super::{
    CreateInstanceFn, InitSdkFn, InitSdkOptions, InstanceConfig, NetworkConfig, RelayerInstance,
    SdkBindings, SdkCallError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeViolation {
    BindingMissing,
    InitSdkMissing,
    CreateInstanceMissing,
    DefaultConfigMissing,
    DefaultConfigNotObject(&'static str),
    InitializedNotBoolean(&'static str),
}

impl fmt::Display for ProbeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeViolation::BindingMissing => f.write_str("relayerSDK is undefined"),
            ProbeViolation::InitSdkMissing => f.write_str("relayerSDK.initSDK is invalid"),
            ProbeViolation::CreateInstanceMissing => {
                f.write_str("relayerSDK.createInstance is invalid")
            }
            ProbeViolation::DefaultConfigMissing => {
                f.write_str("relayerSDK.SepoliaConfig is null or undefined")
            }
            ProbeViolation::DefaultConfigNotObject(kind) => {
                write!(f, "relayerSDK.SepoliaConfig is not an object (got {kind})")
            }
            ProbeViolation::InitializedNotBoolean(kind) => {
                write!(f, "relayerSDK.__initialized__ is invalid (got {kind})")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeViolations(Vec<ProbeViolation>);

impl ProbeViolations {
    pub fn as_slice(&self) -> &[ProbeViolation] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, violation: &ProbeViolation) -> bool {
        self.0.contains(violation)
    }
}

impl fmt::Display for ProbeViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("no violations recorded");
        }
        for (index, violation) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

/// 校验通过的 SDK 句柄。
#[derive(Clone)]
pub struct RelayerSdk {
    init_sdk: InitSdkFn,
    create_instance: CreateInstanceFn,
    default_config: NetworkConfig,
    initialized: Option<bool>,
}

impl RelayerSdk {
    pub fn default_config(&self) -> &NetworkConfig {
        &self.default_config
    }

    /// 绑定上自带的 `__initialized__` 标记。
    pub fn initialized(&self) -> Option<bool> {
        self.initialized
    }

    pub async fn init_sdk(&self, options: Option<InitSdkOptions>) -> Result<bool, SdkCallError> {
        (self.init_sdk)(options).await
    }

    pub async fn create_instance(
        &self,
        config: InstanceConfig,
    ) -> Result<Arc<dyn RelayerInstance>, SdkCallError> {
        (self.create_instance)(config).await
    }
}

impl fmt::Debug for RelayerSdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayerSdk")
            .field("default_config", &self.default_config)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum SdkProbe {
    Valid(RelayerSdk),
    Invalid(ProbeViolations),
}

impl SdkProbe {
    pub fn is_valid(&self) -> bool {
        matches!(self, SdkProbe::Valid(_))
    }

    pub fn into_result(self) -> Result<RelayerSdk, ProbeViolations> {
        match self {
            SdkProbe::Valid(sdk) => Ok(sdk),
            SdkProbe::Invalid(violations) => Err(violations),
        }
    }
}

/// 检查运行时绑定是否满足 SDK 能力约定，逐项记录违规原因。
///
/// 违规信息仅用于诊断（trace 级别日志），调用方只根据 [`SdkProbe`] 变体分支。
pub fn probe_bindings(bindings: Option<&SdkBindings>) -> SdkProbe {
    let Some(bindings) = bindings else {
        trace!(target: "fhevm::relayer", "{}", ProbeViolation::BindingMissing);
        return SdkProbe::Invalid(ProbeViolations(vec![ProbeViolation::BindingMissing]));
    };

    let mut violations = Vec::new();
    if bindings.init_sdk.is_none() {
        violations.push(ProbeViolation::InitSdkMissing);
    }
    if bindings.create_instance.is_none() {
        violations.push(ProbeViolation::CreateInstanceMissing);
    }

    let default_config = match &bindings.sepolia_config {
        None | Some(Value::Null) => {
            violations.push(ProbeViolation::DefaultConfigMissing);
            None
        }
        Some(Value::Object(fields)) => Some(NetworkConfig::new(fields.clone())),
        Some(other) => {
            violations.push(ProbeViolation::DefaultConfigNotObject(json_kind(other)));
            None
        }
    };

    let initialized = match &bindings.initialized {
        None => None,
        Some(Value::Bool(flag)) => Some(*flag),
        Some(other) => {
            violations.push(ProbeViolation::InitializedNotBoolean(json_kind(other)));
            None
        }
    };

    for violation in &violations {
        trace!(target: "fhevm::relayer", "{violation}");
    }

    match (&bindings.init_sdk, &bindings.create_instance, default_config) {
        (Some(init_sdk), Some(create_instance), Some(default_config)) if violations.is_empty() => {
            SdkProbe::Valid(RelayerSdk {
                init_sdk: init_sdk.clone(),
                create_instance: create_instance.clone(),
                default_config,
                initialized,
            })
        }
        _ => SdkProbe::Invalid(ProbeViolations(violations)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct NoKeys;

    impl RelayerInstance for NoKeys {
        fn get_public_key(&self) -> Option<crate::cache::StoredPublicKey> {
            None
        }

        fn get_public_params(&self, _bits: u32) -> Option<crate::cache::StoredPublicParams> {
            None
        }
    }

    fn complete() -> SdkBindings {
        SdkBindings::new()
            .with_init_sdk(|_| async { Ok(true) })
            .with_create_instance(|_| async { Ok(Arc::new(NoKeys) as Arc<dyn RelayerInstance>) })
            .with_sepolia_config(json!({
                "aclContractAddress": "0x687820221192C5B662b25367F70076A37bc79b6c"
            }))
    }

    fn violations_of(bindings: Option<&SdkBindings>) -> ProbeViolations {
        match probe_bindings(bindings) {
            SdkProbe::Valid(_) => panic!("expected invalid bindings"),
            SdkProbe::Invalid(violations) => violations,
        }
    }

    #[test]
    fn accepts_complete_bindings() {
        let sdk = probe_bindings(Some(&complete()))
            .into_result()
            .expect("valid");
        assert_eq!(
            sdk.default_config().acl_contract_address(),
            Some("0x687820221192C5B662b25367F70076A37bc79b6c")
        );
        assert_eq!(sdk.initialized(), None);

        let seeded = complete().with_initialized(json!(true));
        let sdk = probe_bindings(Some(&seeded)).into_result().expect("valid");
        assert_eq!(sdk.initialized(), Some(true));
    }

    #[test]
    fn reports_each_violation() {
        assert!(violations_of(None).contains(&ProbeViolation::BindingMissing));

        let mut no_init = complete();
        no_init.init_sdk = None;
        assert!(violations_of(Some(&no_init)).contains(&ProbeViolation::InitSdkMissing));

        let mut no_create = complete();
        no_create.create_instance = None;
        assert!(
            violations_of(Some(&no_create)).contains(&ProbeViolation::CreateInstanceMissing)
        );

        let string_config = complete().with_sepolia_config(json!("sepolia"));
        assert!(
            violations_of(Some(&string_config))
                .contains(&ProbeViolation::DefaultConfigNotObject("string"))
        );

        let null_config = complete().with_sepolia_config(Value::Null);
        assert!(violations_of(Some(&null_config)).contains(&ProbeViolation::DefaultConfigMissing));
    }

    #[test]
    fn initialized_flag_must_be_strict_boolean() {
        for value in [json!(1), json!("true"), json!(null)] {
            let bindings = complete().with_initialized(value);
            let violations = violations_of(Some(&bindings));
            assert_eq!(violations.as_slice().len(), 1);
            assert!(matches!(
                violations.as_slice()[0],
                ProbeViolation::InitializedNotBoolean(_)
            ));
        }
    }

    #[test]
    fn violations_render_distinct_messages() {
        let bindings = SdkBindings::new().with_initialized(json!(0));
        let rendered = violations_of(Some(&bindings)).to_string();
        assert!(rendered.contains("initSDK"));
        assert!(rendered.contains("createInstance"));
        assert!(rendered.contains("SepoliaConfig"));
        assert!(rendered.contains("__initialized__"));
    }
}
