// src/core/provider/user_data.rs

//! Bootstrap payloads handed to freshly launched VMs.
//!
//! The agent image on every VM runs a connect script at boot that reads the
//! files written here: where the master lives (public and tunneled), which
//! slot to claim, and when its reconnect counter may reset. The script then
//! downloads the agent archive from the master, renames its VM to the slot
//! name, and dials in; nothing else is provisioned through user-data.

use crate::config::UserDataFamily;

/// Everything the agent bootstrap needs to find its slot.
#[derive(Debug, Clone, Copy)]
pub struct AgentBootstrap<'a> {
    pub master_url: &'a str,
    pub master_private_url: &'a str,
    pub executor_name: &'a str,
    pub retry_reset_secs: u64,
}

/// Renders the user-data script for a label's OS family.
pub fn render(family: UserDataFamily, bootstrap: &AgentBootstrap<'_>) -> String {
    match family {
        UserDataFamily::LinuxShell => render_linux(bootstrap),
        UserDataFamily::WindowsHourly => render_windows(bootstrap),
    }
}

fn render_linux(bootstrap: &AgentBootstrap<'_>) -> String {
    // No indentation: this must stay valid as a plain shell script.
    format!(
        "\
#!/bin/bash
echo '{master_url}' > /home/ci_agent/master_url
echo '{master_private_url}' > /home/ci_agent/master_private_url
echo '{executor_name}' > /home/ci_agent/agent_name
echo '{retry_reset}' > /home/ci_agent/agent_retry_reset_seconds
",
        master_url = bootstrap.master_url,
        master_private_url = bootstrap.master_private_url,
        executor_name = bootstrap.executor_name,
        retry_reset = bootstrap.retry_reset_secs,
    )
}

fn render_windows(bootstrap: &AgentBootstrap<'_>) -> String {
    // No indentation: cmd treats leading whitespace as part of the output.
    format!(
        "\
<script>
mkdir C:\\ci_agent
cd C:\\ci_agent
@echo {master_url}> master_url.txt
@echo {master_private_url}> master_private_url.txt
@echo {executor_name}> agent_name.txt
@echo {retry_reset}> agent_retry_reset_seconds.txt
</script>
",
        master_url = bootstrap.master_url,
        master_private_url = bootstrap.master_private_url,
        executor_name = bootstrap.executor_name,
        retry_reset = bootstrap.retry_reset_secs,
    )
}
