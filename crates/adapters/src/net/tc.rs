use domain::common::entity::SysId;

/// Classifier pin path for one traffic direction of a program family.
pub fn classifier_pin(pin_dir: &str, sys: SysId, direction: &str) -> String {
    format!("{pin_dir}/classifier_{}_{direction}", sys.as_str())
}

/// `tc` argument lists attaching `sys` to `dev`: one clsact qdisc, then one
/// direct-action filter per direction.
pub fn attach_commands(pin_dir: &str, sys: SysId, dev: &str) -> Vec<Vec<String>> {
    let mut cmds = vec![super::command::args(&[
        "qdisc", "replace", "dev", dev, "clsact",
    ])];
    for direction in ["ingress", "egress"] {
        let pinned = classifier_pin(pin_dir, sys, direction);
        cmds.push(super::command::args(&[
            "filter",
            "replace",
            "dev",
            dev,
            direction,
            "bpf",
            "direct-action",
            "pinned",
            pinned.as_str(),
        ]));
    }
    cmds
}

pub fn detach_command(dev: &str) -> Vec<String> {
    super::command::args(&["qdisc", "del", "dev", dev, "clsact"])
}

/// stderr fragments meaning the target is already gone.
pub const GONE: &[&str] = &[
    "Cannot find device",
    "No such file or directory",
    "Invalid handle",
    "Cannot delete qdisc with handle of zero",
];
