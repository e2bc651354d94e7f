//! Which components this process runs.

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Gateway,
    Agent,
    Echo,
    All,
}

impl Role {
    pub fn name(self) -> &'static str {
        match self {
            Role::Gateway => "gateway",
            Role::Agent => "agent",
            Role::Echo => "echo",
            Role::All => "all",
        }
    }

    pub fn runs_gateway(self) -> bool {
        matches!(self, Role::Gateway | Role::All)
    }

    pub fn runs_agent(self) -> bool {
        matches!(self, Role::Agent | Role::All)
    }

    pub fn runs_echo(self) -> bool {
        matches!(self, Role::Echo | Role::All)
    }

    pub fn needs_broker(self) -> bool {
        self.runs_gateway() || self.runs_agent()
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gateway" => Ok(Role::Gateway),
            "agent" => Ok(Role::Agent),
            "echo" => Ok(Role::Echo),
            "all" => Ok(Role::All),
            other => anyhow::bail!("unknown role {other:?}, expected gateway, agent, echo or all"),
        }
    }
}
