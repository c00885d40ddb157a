//! Deterministic register mutations applied at startup and on teardown.

use super::entity::{CfgFlag, ConfigValue, FlagWord};
use super::error::ConfigRegisterError;
use crate::common::entity::IpStack;

/// UDP flags that already express an explicit policy on a stack.
const UDP_EXPLICIT_POLICY: [CfgFlag; 5] = [
    CfgFlag::UdpProtoDenyAll,
    CfgFlag::UdpNatByIpPortOn,
    CfgFlag::UdpNatByIpOn,
    CfgFlag::UdpNatByPortOn,
    CfgFlag::UdpNatAllOff,
];

/// Parse a config magic token: empty means "no override".
pub fn parse_magic(token: &str) -> Result<Option<u64>, ConfigRegisterError> {
    let token = token.trim();
    if token.is_empty() {
        return Ok(None);
    }
    let parsed = match token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => token.parse::<u64>(),
    };
    parsed.map(Some).map_err(|_| ConfigRegisterError::InvalidMagic {
        token: token.to_string(),
    })
}

/// Per-stack magic overrides; `None` keeps the word read from the kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MagicOverride {
    pub ipv4: Option<u64>,
    pub ipv6: Option<u64>,
}

impl MagicOverride {
    pub fn parse(ipv4: &str, ipv6: &str) -> Result<Self, ConfigRegisterError> {
        Ok(Self {
            ipv4: parse_magic(ipv4)?,
            ipv6: parse_magic(ipv6)?,
        })
    }

    pub fn apply(&self, value: &mut ConfigValue) {
        if let Some(bits) = self.ipv4 {
            value.ipv4 = FlagWord::from_bits(bits);
        }
        if let Some(bits) = self.ipv6 {
            value.ipv6 = FlagWord::from_bits(bits);
        }
    }
}

/// Mesh register initialization (IPv4 stack).
///
/// Selects UDP allow-all only when no explicit UDP policy exists, then
/// always turns ACL enforcement on.
pub fn init_mesh(value: &mut ConfigValue) {
    let v4 = value.stack_mut(IpStack::V4);
    if !v4.is_set(CfgFlag::UdpProtoAllowAll) && !v4.any_set(&UDP_EXPLICIT_POLICY) {
        v4.set(CfgFlag::UdpProtoAllowAll);
    }
    v4.set(CfgFlag::AclCheckOn);
}

/// E4lb register initialization.
///
/// Enabling a stack is prescriptive; disabling only drops the catch-all deny.
pub fn init_e4lb(value: &mut ConfigValue, ipv4_enabled: bool, ipv6_enabled: bool) {
    for (stack, enabled) in [(IpStack::V4, ipv4_enabled), (IpStack::V6, ipv6_enabled)] {
        let word = value.stack_mut(stack);
        if enabled {
            word.set(CfgFlag::TcpNatByIpPortOn);
            word.clear(CfgFlag::TcpNatAllOff);
            word.set(CfgFlag::TcpProtoAllowNatEscape);
            word.set(CfgFlag::UdpProtoAllowAll);
            word.clear(CfgFlag::OthProtoDenyAll);
        } else {
            word.clear(CfgFlag::DenyAll);
        }
    }
}

/// E4lb register teardown: NAT off on both stacks.
pub fn e4lb_off(value: &mut ConfigValue) {
    for stack in [IpStack::V4, IpStack::V6] {
        let word = value.stack_mut(stack);
        word.set(CfgFlag::TcpNatAllOff);
        word.clear(CfgFlag::TcpNatByIpPortOn);
        word.clear(CfgFlag::TcpProtoAllowNatEscape);
    }
}

/// Ensure ACL enforcement on the IPv4 stack. Returns whether a change was made.
pub fn ensure_acl(value: &mut ConfigValue) -> bool {
    if value.ipv4.is_set(CfgFlag::AclCheckOn) {
        return false;
    }
    value.ipv4.set(CfgFlag::AclCheckOn);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_accepts_decimal_and_hex() {
        assert_eq!(parse_magic("").unwrap(), None);
        assert_eq!(parse_magic("  ").unwrap(), None);
        assert_eq!(parse_magic("131072").unwrap(), Some(131_072));
        assert_eq!(parse_magic("0x20000").unwrap(), Some(0x20000));
        assert_eq!(parse_magic("0XFF").unwrap(), Some(255));
    }

    #[test]
    fn magic_rejects_garbage() {
        assert!(matches!(
            parse_magic("v1.2"),
            Err(ConfigRegisterError::InvalidMagic { .. })
        ));
        assert!(parse_magic("0xZZ").is_err());
    }

    #[test]
    fn magic_override_replaces_only_given_stacks() {
        let mut v = ConfigValue::default();
        v.ipv6.set(CfgFlag::DenyAll);
        MagicOverride::parse("0x3", "").unwrap().apply(&mut v);
        assert_eq!(v.ipv4.bits(), 3);
        assert!(v.ipv6.is_set(CfgFlag::DenyAll));
    }

    #[test]
    fn init_mesh_selects_udp_allow_all_on_blank_register() {
        let mut v = ConfigValue::default();
        init_mesh(&mut v);
        assert!(v.ipv4.is_set(CfgFlag::UdpProtoAllowAll));
        assert!(v.ipv4.is_set(CfgFlag::AclCheckOn));
        assert_eq!(v.ipv6, FlagWord::default());
    }

    #[test]
    fn init_mesh_respects_explicit_udp_policy() {
        for flag in UDP_EXPLICIT_POLICY {
            let mut v = ConfigValue::default();
            v.ipv4.set(flag);
            init_mesh(&mut v);
            assert!(!v.ipv4.is_set(CfgFlag::UdpProtoAllowAll), "{flag:?}");
            assert!(v.ipv4.is_set(CfgFlag::AclCheckOn));
        }
    }

    #[test]
    fn init_e4lb_enabled_never_leaves_nat_all_off_without_by_ip_port() {
        let seeds = [0u64, u64::MAX, 1 << 12, (1 << 12) | (1 << 8) | 1];
        for seed in seeds {
            let mut v = ConfigValue {
                ipv4: FlagWord::from_bits(seed),
                ipv6: FlagWord::from_bits(seed),
            };
            init_e4lb(&mut v, true, true);
            for w in [v.ipv4, v.ipv6] {
                assert!(
                    !(w.is_set(CfgFlag::TcpNatAllOff) && !w.is_set(CfgFlag::TcpNatByIpPortOn)),
                    "seed {seed:#x}"
                );
                assert!(w.is_set(CfgFlag::TcpNatByIpPortOn));
                assert!(w.is_set(CfgFlag::TcpProtoAllowNatEscape));
                assert!(w.is_set(CfgFlag::UdpProtoAllowAll));
                assert!(!w.is_set(CfgFlag::OthProtoDenyAll));
            }
        }
    }

    #[test]
    fn init_e4lb_disabled_stack_only_clears_deny_all() {
        let mut v = ConfigValue::default();
        v.ipv6.set(CfgFlag::DenyAll);
        v.ipv6.set(CfgFlag::TcpNatAllOff);
        v.ipv6.set(CfgFlag::OthProtoDenyAll);
        init_e4lb(&mut v, true, false);
        assert!(!v.ipv6.is_set(CfgFlag::DenyAll));
        assert!(v.ipv6.is_set(CfgFlag::TcpNatAllOff));
        assert!(v.ipv6.is_set(CfgFlag::OthProtoDenyAll));
        assert!(v.ipv4.is_set(CfgFlag::TcpNatByIpPortOn));
    }

    #[test]
    fn e4lb_off_turns_nat_off_on_both_stacks() {
        let mut v = ConfigValue::default();
        init_e4lb(&mut v, true, true);
        e4lb_off(&mut v);
        for w in [v.ipv4, v.ipv6] {
            assert!(w.is_set(CfgFlag::TcpNatAllOff));
            assert!(!w.is_set(CfgFlag::TcpNatByIpPortOn));
            assert!(!w.is_set(CfgFlag::TcpProtoAllowNatEscape));
        }
    }

    #[test]
    fn ensure_acl_reports_change_once() {
        let mut v = ConfigValue::default();
        assert!(ensure_acl(&mut v));
        assert!(!ensure_acl(&mut v));
    }
}
