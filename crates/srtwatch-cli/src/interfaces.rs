//! Host interface discovery — non-loopback interfaces carrying an IPv4
//! address, the candidates for binding a listener or attaching netem.

use std::process::Command;

#[derive(Debug, Clone)]
pub struct HostInterface {
    pub name: String,
    pub ipv4: String,
}

/// Enumerate interfaces from `/sys/class/net`, keeping those with an
/// IPv4 address and skipping loopback.
pub fn list() -> Vec<HostInterface> {
    let mut out = Vec::new();
    let entries = match std::fs::read_dir("/sys/class/net") {
        Ok(entries) => entries,
        Err(_) => return out,
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name == "lo" {
            continue;
        }
        if let Some(ipv4) = ipv4_of(&name) {
            out.push(HostInterface { name, ipv4 });
        }
    }

    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

/// First IPv4 address of an interface, via `ip -o -4 addr show`.
fn ipv4_of(name: &str) -> Option<String> {
    let out = Command::new("ip")
        .args(["-o", "-4", "addr", "show", "dev", name])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    parse_ip_addr_output(&String::from_utf8_lossy(&out.stdout))
}

/// Pull the address out of an `ip -o -4 addr` line:
/// `2: eth0    inet 192.168.1.7/24 brd 192.168.1.255 scope global eth0`
fn parse_ip_addr_output(text: &str) -> Option<String> {
    for line in text.lines() {
        let mut fields = line.split_whitespace();
        while let Some(field) = fields.next() {
            if field == "inet" {
                let cidr = fields.next()?;
                return Some(cidr.split('/').next().unwrap_or(cidr).to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_an_ip_addr_line() {
        let line = "2: eth0    inet 192.168.1.7/24 brd 192.168.1.255 scope global eth0\\       valid_lft forever preferred_lft forever\n";
        assert_eq!(parse_ip_addr_output(line).as_deref(), Some("192.168.1.7"));
    }

    #[test]
    fn no_inet_token_is_none() {
        assert_eq!(parse_ip_addr_output("3: wwan0    mtu 1500\n"), None);
        assert_eq!(parse_ip_addr_output(""), None);
    }
}
