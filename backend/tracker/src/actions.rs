//! Write actions plugged into [`TxOrchestrator`](crate::orchestrator::TxOrchestrator).
//!
//! | Action              | Params          | Writes                                                          |
//! |---------------------|-----------------|-----------------------------------------------------------------|
//! | [`Donate`] (native) | decimal amount  | `donateETH(projectId)` with value                               |
//! | [`Donate`] (ERC-20) | decimal amount  | `approve(contract, amount)` if short, `donateERC20(projectId, amount)` |
//! | [`Vote`]            | milestone index | `voteOnMilestone(projectId, milestoneId)`                       |
//!
//! Amount and balance checks happen here, before the wallet is ever asked to
//! sign anything. They only save the donor a guaranteed revert; the contract
//! still has the final word.

use tracing::debug;

use crate::errors::{PreconditionError, Result, TrackerError};
use crate::format::{format_units, parse_units};
use crate::gateway::{address_arg, read_uint, uint_arg, ChainGateway, ReadCall, WriteCall};
use crate::orchestrator::{TxAction, TxPlan};
use crate::types::{Address, Project};

/// How a project is funded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Funding {
    Native { decimals: u32 },
    Token(Address),
}

#[derive(Debug, Clone)]
pub struct Donate {
    contract: Address,
    project_id: u64,
    funding: Funding,
}

impl Donate {
    pub fn new(contract: Address, project_id: u64, funding: Funding) -> Self {
        Self {
            contract,
            project_id,
            funding,
        }
    }

    /// Pick native or token funding from the project's donation token.
    pub fn for_project(contract: Address, project: &Project, native_decimals: u32) -> Self {
        let funding = if project.accepts_native() {
            Funding::Native {
                decimals: native_decimals,
            }
        } else {
            Funding::Token(project.donation_token)
        };
        Self::new(contract, project.id, funding)
    }

    async fn plan_native<G: ChainGateway>(&self, gateway: &G, wallet: Address, amount: &str, decimals: u32) -> Result<TxPlan> {
        let value = positive_amount(amount, decimals)?;
        let available = gateway.native_balance(&wallet).await?;
        check_balance(value, available)?;

        Ok(TxPlan {
            steps: vec![WriteCall {
                contract: self.contract,
                function: "donateETH",
                args: vec![uint_arg(self.project_id)],
                value,
            }],
            summary: format!(
                "Donated {} to project #{}",
                format_units(value, decimals),
                self.project_id
            ),
        })
    }

    async fn plan_token<G: ChainGateway>(&self, gateway: &G, wallet: Address, amount: &str, token: Address) -> Result<TxPlan> {
        let decimals = read_uint(gateway, &ReadCall::new(token, "decimals", vec![])).await?;
        let decimals = u32::try_from(decimals)
            .map_err(|_| TrackerError::UnexpectedShape(format!("decimals {decimals}")))?;
        let value = positive_amount(amount, decimals)?;

        let available = read_uint(
            gateway,
            &ReadCall::new(token, "balanceOf", vec![address_arg(&wallet)]),
        )
        .await?;
        check_balance(value, available)?;

        let allowance = read_uint(
            gateway,
            &ReadCall::new(
                token,
                "allowance",
                vec![address_arg(&wallet), address_arg(&self.contract)],
            ),
        )
        .await?;

        let mut steps = Vec::with_capacity(2);
        if allowance < value {
            debug!("allowance {allowance} < {value}, approval required");
            steps.push(WriteCall {
                contract: token,
                function: "approve",
                args: vec![address_arg(&self.contract), uint_arg(value)],
                value: 0,
            });
        }
        steps.push(WriteCall {
            contract: self.contract,
            function: "donateERC20",
            args: vec![uint_arg(self.project_id), uint_arg(value)],
            value: 0,
        });

        Ok(TxPlan {
            steps,
            summary: format!(
                "Donated {} tokens to project #{}",
                format_units(value, decimals),
                self.project_id
            ),
        })
    }
}

impl TxAction for Donate {
    type Params = String;

    fn name(&self) -> &'static str {
        "donation"
    }

    async fn plan<G: ChainGateway>(&self, gateway: &G, wallet: Address, amount: String) -> Result<TxPlan> {
        match self.funding {
            Funding::Native { decimals } => self.plan_native(gateway, wallet, &amount, decimals).await,
            Funding::Token(token) => self.plan_token(gateway, wallet, &amount, token).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Vote {
    contract: Address,
    project_id: u64,
}

impl Vote {
    pub fn new(contract: Address, project_id: u64) -> Self {
        Self {
            contract,
            project_id,
        }
    }
}

impl TxAction for Vote {
    /// Zero-based milestone index.
    type Params = u64;

    fn name(&self) -> &'static str {
        "vote"
    }

    async fn plan<G: ChainGateway>(&self, _gateway: &G, _wallet: Address, milestone_id: u64) -> Result<TxPlan> {
        Ok(TxPlan {
            steps: vec![WriteCall {
                contract: self.contract,
                function: "voteOnMilestone",
                args: vec![uint_arg(self.project_id), uint_arg(milestone_id)],
                value: 0,
            }],
            summary: format!(
                "Vote recorded for milestone {} of project #{}",
                milestone_id.saturating_add(1),
                self.project_id
            ),
        })
    }
}

fn positive_amount(amount: &str, decimals: u32) -> Result<u128> {
    let value = parse_units(amount, decimals)?;
    if value == 0 {
        return Err(PreconditionError::ZeroAmount.into());
    }
    Ok(value)
}

fn check_balance(requested: u128, available: u128) -> Result<()> {
    if requested > available {
        return Err(PreconditionError::InsufficientBalance {
            requested,
            available,
        }
        .into());
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
