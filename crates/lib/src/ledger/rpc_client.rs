use std::str::FromStr;
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use solana_account_decoder::UiAccountData;
use solana_client::{
    nonblocking::rpc_client::RpcClient, rpc_request::TokenAccountsFilter,
};
use solana_commitment_config::CommitmentConfig;
use solana_sdk::{
    instruction::Instruction,
    program_pack::Pack,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::Transaction,
};
use solana_transaction_status_client_types::{
    option_serializer::OptionSerializer, EncodedTransaction, UiInstruction, UiMessage,
    UiParsedInstruction, UiTransactionEncoding,
};

use super::{AccountSnapshot, LedgerClient, TokenAccountData};
use crate::error::SweepError;

/// Production ledger client: nonblocking Solana RPC plus the operator keypair.
pub struct RpcLedgerClient {
    rpc: Arc<RpcClient>,
    authority: Arc<Keypair>,
}

impl RpcLedgerClient {
    pub fn new(rpc: Arc<RpcClient>, authority: Arc<Keypair>) -> Self {
        Self { rpc, authority }
    }

    fn unpack_token_account(
        address: &Pubkey,
        lamports: u64,
        owning_program: &Pubkey,
        data: &[u8],
    ) -> Result<TokenAccountData, SweepError> {
        if *owning_program == spl_token_interface::id() {
            let state = spl_token_interface::state::Account::unpack(data).map_err(|e| {
                SweepError::TokenOperationError(format!("Failed to unpack token account: {e}"))
            })?;
            Ok(TokenAccountData {
                pubkey: *address,
                mint: state.mint,
                owner: state.owner,
                amount: state.amount,
                lamports,
                program_id: *owning_program,
            })
        } else if *owning_program == spl_token_2022_interface::id() {
            // Token-2022 accounts may carry extensions past the base layout.
            let state = spl_token_2022_interface::extension::StateWithExtensions::<
                spl_token_2022_interface::state::Account,
            >::unpack(data)
            .map_err(|e| {
                SweepError::TokenOperationError(format!(
                    "Failed to unpack token-2022 account: {e}"
                ))
            })?;
            Ok(TokenAccountData {
                pubkey: *address,
                mint: state.base.mint,
                owner: state.base.owner,
                amount: state.base.amount,
                lamports,
                program_id: *owning_program,
            })
        } else {
            Err(SweepError::TokenOperationError(format!(
                "Account {address} is not owned by a token program"
            )))
        }
    }

    fn parse_keyed_account_data(data: &UiAccountData) -> Option<(u64, Pubkey, Pubkey)> {
        match data {
            UiAccountData::Json(parsed) => {
                let info = parsed.parsed.get("info")?;
                let mint = info.get("mint")?.as_str()?;
                let owner = info.get("owner")?.as_str()?;
                let amount = info.get("tokenAmount")?.get("amount")?.as_str()?;
                Some((
                    amount.parse().ok()?,
                    Pubkey::from_str(mint).ok()?,
                    Pubkey::from_str(owner).ok()?,
                ))
            }
            UiAccountData::Binary(data_str, _) => {
                let bytes = general_purpose::STANDARD.decode(data_str).ok()?;
                if let Ok(acc) = spl_token_interface::state::Account::unpack(&bytes) {
                    return Some((acc.amount, acc.mint, acc.owner));
                }
                if let Ok(acc) = spl_token_2022_interface::extension::StateWithExtensions::<
                    spl_token_2022_interface::state::Account,
                >::unpack(&bytes)
                {
                    return Some((acc.base.amount, acc.base.mint, acc.base.owner));
                }
                None
            }
            _ => None,
        }
    }

    /// Addresses created by a single parsed instruction, if any.
    fn created_address(instruction: &UiInstruction) -> Option<Pubkey> {
        let UiInstruction::Parsed(UiParsedInstruction::Parsed(parsed)) = instruction else {
            return None;
        };
        let kind = parsed.parsed.get("type")?.as_str()?;
        let info = parsed.parsed.get("info")?;

        let address = match (parsed.program.as_str(), kind) {
            ("spl-token", "initializeAccount")
            | ("spl-token", "initializeAccount2")
            | ("spl-token", "initializeAccount3")
            | ("spl-token-2022", "initializeAccount")
            | ("spl-token-2022", "initializeAccount2")
            | ("spl-token-2022", "initializeAccount3")
            | ("spl-associated-token-account", "create")
            | ("spl-associated-token-account", "createIdempotent") => {
                info.get("account")?.as_str()?
            }
            ("system", "createAccount") => info.get("newAccount")?.as_str()?,
            _ => return None,
        };

        Pubkey::from_str(address).ok()
    }
}

#[async_trait::async_trait]
impl LedgerClient for RpcLedgerClient {
    fn authority(&self) -> Pubkey {
        self.authority.pubkey()
    }

    async fn fetch_account_info(
        &self,
        address: &Pubkey,
    ) -> Result<Option<AccountSnapshot>, SweepError> {
        let response = self
            .rpc
            .get_account_with_commitment(address, CommitmentConfig::confirmed())
            .await?;

        Ok(response.value.map(|account| AccountSnapshot {
            lamports: account.lamports,
            owning_program: account.owner,
        }))
    }

    async fn fetch_token_account(
        &self,
        address: &Pubkey,
    ) -> Result<Option<TokenAccountData>, SweepError> {
        let response = self
            .rpc
            .get_account_with_commitment(address, CommitmentConfig::confirmed())
            .await?;

        match response.value {
            None => Ok(None),
            Some(account) => Self::unpack_token_account(
                address,
                account.lamports,
                &account.owner,
                &account.data,
            )
            .map(Some),
        }
    }

    async fn fetch_owned_token_accounts(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<TokenAccountData>, SweepError> {
        let mut all_accounts = Vec::new();
        let programs = [spl_token_interface::id(), spl_token_2022_interface::id()];

        for program_id in programs {
            let accounts = self
                .rpc
                .get_token_accounts_by_owner(owner, TokenAccountsFilter::ProgramId(program_id))
                .await?;

            for keyed in accounts {
                let Some((amount, mint, owner)) =
                    Self::parse_keyed_account_data(&keyed.account.data)
                else {
                    tracing::warn!(account = %keyed.pubkey, "Skipping unparseable token account");
                    continue;
                };
                let Ok(pubkey) = Pubkey::from_str(&keyed.pubkey) else {
                    continue;
                };
                all_accounts.push(TokenAccountData {
                    pubkey,
                    mint,
                    owner,
                    amount,
                    lamports: keyed.account.lamports,
                    program_id,
                });
            }
        }

        Ok(all_accounts)
    }

    async fn fetch_created_accounts(&self, signature: &str) -> Result<Vec<Pubkey>, SweepError> {
        let signature = Signature::from_str(signature).map_err(|e| {
            SweepError::ValidationError(format!("Invalid transaction signature: {e}"))
        })?;

        let confirmed = self
            .rpc
            .get_transaction(&signature, UiTransactionEncoding::JsonParsed)
            .await?;

        let mut created = Vec::new();
        let tx_with_meta = confirmed.transaction;

        if let EncodedTransaction::Json(ui_tx) = &tx_with_meta.transaction {
            if let UiMessage::Parsed(message) = &ui_tx.message {
                for instruction in &message.instructions {
                    if let Some(address) = Self::created_address(instruction) {
                        if !created.contains(&address) {
                            created.push(address);
                        }
                    }
                }
            }
        }

        if let Some(meta) = &tx_with_meta.meta {
            if let OptionSerializer::Some(inner_sets) = &meta.inner_instructions {
                for set in inner_sets {
                    for instruction in &set.instructions {
                        if let Some(address) = Self::created_address(instruction) {
                            if !created.contains(&address) {
                                created.push(address);
                            }
                        }
                    }
                }
            }
        }

        Ok(created)
    }

    async fn submit_close(
        &self,
        account: &TokenAccountData,
        destination: &Pubkey,
    ) -> Result<String, SweepError> {
        let authority = self.authority.pubkey();

        let ix: Instruction = if account.program_id == spl_token_interface::id() {
            spl_token_interface::instruction::close_account(
                &account.program_id,
                &account.pubkey,
                destination,
                &authority,
                &[&authority],
            )
        } else {
            spl_token_2022_interface::instruction::close_account(
                &account.program_id,
                &account.pubkey,
                destination,
                &authority,
                &[&authority],
            )
        }
        .map_err(|e| {
            SweepError::TransactionExecutionFailed(format!(
                "Failed to build close instruction: {e}"
            ))
        })?;

        let recent_blockhash = self.rpc.get_latest_blockhash().await?;

        let tx = Transaction::new_signed_with_payer(
            &[ix],
            Some(&authority),
            &[self.authority.as_ref()],
            recent_blockhash,
        );

        self.rpc
            .send_and_confirm_transaction(&tx)
            .await
            .map(|signature| signature.to_string())
            .map_err(|e| SweepError::TransactionExecutionFailed(e.to_string()))
    }
}
