//! Paper trading venue with simulated fills

use super::{
    AccountInfo, Broker, BrokerPosition, FillingMode, OrderAction, OrderRequest, OrderResult,
    OrderType, Quote, SymbolInfo, COMMENT_CHECK_DONE, COMMENT_EXECUTED,
};
use crate::error::{EngineError, Result};
use crate::position::Side;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use tokio::sync::{RwLock, RwLockWriteGuard};

const RETCODE_DONE: u32 = 10009;
const RETCODE_REJECT: u32 = 10006;
const RETCODE_INVALID_FILL: u32 = 10030;
const RETCODE_POSITION_CLOSED: u32 = 10036;

/// Requests kept per journal before the oldest are dropped
pub const DEFAULT_JOURNAL_CAPACITY: usize = 1_000;

#[derive(Debug, Clone)]
struct Instrument {
    info: SymbolInfo,
    quote: Quote,
    filling_modes: Vec<FillingMode>,
}

#[derive(Debug)]
struct PaperState {
    account: AccountInfo,
    instruments: HashMap<String, Instrument>,
    positions: Vec<BrokerPosition>,
    next_ticket: u64,
    submitted: VecDeque<OrderRequest>,
    validated: VecDeque<OrderRequest>,
    journal_capacity: usize,
    reject_next: Option<String>,
    unreachable: bool,
}

/// Account state shared across processes through the ledger file
#[derive(Debug, Serialize, Deserialize)]
struct PaperLedger {
    account: AccountInfo,
    positions: Vec<BrokerPosition>,
    next_ticket: u64,
}

/// In-memory venue: opens, closes and modifies positions immediately at
/// the request price and realizes profit into the balance on close
///
/// With a ledger file, the account and open positions are reloaded from it
/// before every account, position or order call and written back after
/// every executed order, so separate processes see one venue.
pub struct PaperBroker {
    state: RwLock<PaperState>,
    ledger_path: Option<PathBuf>,
}

impl PaperBroker {
    /// Create a venue with no instruments and no positions
    pub fn new(account: AccountInfo) -> Self {
        Self {
            state: RwLock::new(PaperState {
                account,
                instruments: HashMap::new(),
                positions: vec![],
                next_ticket: 1,
                submitted: VecDeque::new(),
                validated: VecDeque::new(),
                journal_capacity: DEFAULT_JOURNAL_CAPACITY,
                reject_next: None,
                unreachable: false,
            }),
            ledger_path: None,
        }
    }

    /// Share account and positions with other processes through a JSON file
    ///
    /// A missing file starts from the seeded account and is created on the
    /// first executed order.
    pub fn with_ledger(mut self, path: impl Into<PathBuf>) -> Self {
        self.ledger_path = Some(path.into());
        self
    }

    /// Keep at most `capacity` submitted and validated requests each
    pub fn with_journal_capacity(mut self, capacity: usize) -> Self {
        self.state.get_mut().journal_capacity = capacity;
        self
    }

    /// Write access with the ledger reloaded
    async fn synced(&self) -> Result<RwLockWriteGuard<'_, PaperState>> {
        let mut state = self.state.write().await;
        let Some(path) = &self.ledger_path else {
            return Ok(state);
        };
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(state),
            Err(e) => {
                return Err(EngineError::Connectivity(format!(
                    "paper ledger {} unreadable: {e}",
                    path.display()
                )))
            }
        };
        let ledger: PaperLedger = serde_json::from_slice(&bytes).map_err(|e| {
            EngineError::InvalidInstrumentState(format!(
                "paper ledger {} malformed: {e}",
                path.display()
            ))
        })?;
        state.account = ledger.account;
        state.positions = ledger.positions;
        state.next_ticket = ledger.next_ticket;
        Ok(state)
    }

    async fn persist(&self, state: &PaperState) {
        let Some(path) = &self.ledger_path else {
            return;
        };
        let ledger = PaperLedger {
            account: state.account,
            positions: state.positions.clone(),
            next_ticket: state.next_ticket,
        };
        let written = match serde_json::to_vec_pretty(&ledger) {
            Ok(bytes) => tokio::fs::write(path, bytes).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(error) = written {
            tracing::warn!(path = %path.display(), %error, "Paper ledger not written");
        }
    }

    /// Register an instrument accepting every filling mode
    pub async fn add_instrument(&self, symbol: &str, info: SymbolInfo, quote: Quote) {
        let mut state = self.state.write().await;
        state.instruments.insert(
            symbol.to_string(),
            Instrument {
                info,
                quote,
                filling_modes: vec![
                    FillingMode::FillOrKill,
                    FillingMode::ImmediateOrCancel,
                    FillingMode::Return,
                ],
            },
        );
    }

    /// Restrict the filling modes an instrument accepts
    pub async fn set_filling_modes(&self, symbol: &str, modes: Vec<FillingMode>) {
        let mut state = self.state.write().await;
        if let Some(instrument) = state.instruments.get_mut(symbol) {
            instrument.filling_modes = modes;
        }
    }

    /// Move the market for a symbol
    pub async fn set_quote(&self, symbol: &str, bid: Decimal, ask: Decimal) {
        let mut state = self.state.write().await;
        if let Some(instrument) = state.instruments.get_mut(symbol) {
            instrument.quote = Quote { bid, ask };
        }
    }

    /// Seed a position opened outside this process
    pub async fn insert_position(&self, position: BrokerPosition) {
        let mut state = self.state.write().await;
        state.next_ticket = state.next_ticket.max(position.ticket + 1);
        state.positions.push(position);
    }

    /// Remove a position without a closing deal (stop or target hit)
    pub async fn remove_position(&self, ticket: u64) {
        let mut state = self.state.write().await;
        state.positions.retain(|p| p.ticket != ticket);
    }

    /// Reject the next submitted order with the given comment
    pub async fn reject_next_order(&self, comment: &str) {
        self.state.write().await.reject_next = Some(comment.to_string());
    }

    /// Make every call fail with a connectivity error
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.state.write().await.unreachable = unreachable;
    }

    /// Every request passed to `submit_order`, in order
    pub async fn submitted_orders(&self) -> Vec<OrderRequest> {
        self.state.read().await.submitted.iter().cloned().collect()
    }

    /// Every request passed to `validate_order`, in order
    pub async fn validated_orders(&self) -> Vec<OrderRequest> {
        self.state.read().await.validated.iter().cloned().collect()
    }

    /// Current stop-loss of a position, zero when unset
    pub async fn stop_loss(&self, ticket: u64) -> Option<Decimal> {
        let state = self.state.read().await;
        state
            .positions
            .iter()
            .find(|p| p.ticket == ticket)
            .map(|p| p.stop_loss)
    }
}

fn journal(entries: &mut VecDeque<OrderRequest>, capacity: usize, request: &OrderRequest) {
    if capacity == 0 {
        return;
    }
    while entries.len() >= capacity {
        entries.pop_front();
    }
    entries.push_back(request.clone());
}

impl PaperState {
    fn ensure_reachable(&self) -> Result<()> {
        if self.unreachable {
            return Err(EngineError::Connectivity("paper venue unreachable".to_string()));
        }
        Ok(())
    }

    fn instrument(&self, symbol: &str) -> Result<&Instrument> {
        self.instruments
            .get(symbol)
            .ok_or_else(|| EngineError::InvalidInstrumentState(format!("unknown symbol {symbol}")))
    }

    fn floating_profit(&self, position: &BrokerPosition) -> Option<Decimal> {
        let instrument = self.instruments.get(&position.symbol)?;
        let exit = match position.side {
            Side::Long => instrument.quote.bid,
            Side::Short => instrument.quote.ask,
        };
        let move_ = match position.side {
            Side::Long => exit - position.open_price,
            Side::Short => position.open_price - exit,
        };
        Some(move_ * position.volume * instrument.info.contract_size)
    }

    fn open(&mut self, request: &OrderRequest) -> OrderResult {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let side = match request.order_type {
            OrderType::Buy => Side::Long,
            OrderType::Sell => Side::Short,
        };
        self.positions.push(BrokerPosition {
            ticket,
            symbol: request.symbol.clone(),
            side,
            volume: request.volume,
            open_price: request.price,
            stop_loss: request.stop_loss.unwrap_or_default(),
            take_profit: request.take_profit.unwrap_or_default(),
            profit: Decimal::ZERO,
        });
        tracing::info!(ticket, symbol = %request.symbol, %side, "Paper position opened");
        executed(Some(ticket), Some(request.price))
    }

    fn close(&mut self, ticket: u64, request: &OrderRequest) -> OrderResult {
        let Some(index) = self.positions.iter().position(|p| p.ticket == ticket) else {
            return rejected(RETCODE_POSITION_CLOSED, "Position doesn't exist");
        };
        let position = self.positions.remove(index);
        let profit = self.floating_profit(&position).unwrap_or(position.profit);
        self.account.balance += profit;
        tracing::info!(ticket, symbol = %request.symbol, %profit, "Paper position closed");
        executed(Some(ticket), Some(request.price))
    }

    fn modify(&mut self, request: &OrderRequest) -> OrderResult {
        let Some(ticket) = request.position else {
            return rejected(RETCODE_REJECT, "Invalid request");
        };
        let Some(position) = self.positions.iter_mut().find(|p| p.ticket == ticket) else {
            return rejected(RETCODE_POSITION_CLOSED, "Position doesn't exist");
        };
        position.stop_loss = request.stop_loss.unwrap_or_default();
        position.take_profit = request.take_profit.unwrap_or_default();
        executed(Some(ticket), None)
    }
}

fn executed(ticket: Option<u64>, price: Option<Decimal>) -> OrderResult {
    OrderResult {
        success: true,
        retcode: Some(RETCODE_DONE),
        comment: COMMENT_EXECUTED.to_string(),
        ticket,
        price,
    }
}

fn rejected(retcode: u32, comment: &str) -> OrderResult {
    OrderResult {
        success: false,
        retcode: Some(retcode),
        comment: comment.to_string(),
        ticket: None,
        price: None,
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn quote(&self, symbol: &str) -> Result<Quote> {
        let state = self.state.read().await;
        state.ensure_reachable()?;
        Ok(state.instrument(symbol)?.quote)
    }

    async fn account_info(&self) -> Result<AccountInfo> {
        let state = self.synced().await?;
        state.ensure_reachable()?;
        Ok(state.account)
    }

    async fn symbol_info(&self, symbol: &str) -> Result<SymbolInfo> {
        let state = self.state.read().await;
        state.ensure_reachable()?;
        Ok(state.instrument(symbol)?.info)
    }

    async fn open_positions(&self) -> Result<Vec<BrokerPosition>> {
        let state = self.synced().await?;
        state.ensure_reachable()?;
        Ok(state
            .positions
            .iter()
            .map(|p| BrokerPosition {
                profit: state.floating_profit(p).unwrap_or(p.profit),
                ..p.clone()
            })
            .collect())
    }

    async fn validate_order(&self, request: &OrderRequest) -> Result<bool> {
        let mut state = self.state.write().await;
        state.ensure_reachable()?;
        let capacity = state.journal_capacity;
        journal(&mut state.validated, capacity, request);
        let accepted = match state.instruments.get(&request.symbol) {
            Some(instrument) => request
                .filling
                .map_or(true, |mode| instrument.filling_modes.contains(&mode)),
            None => false,
        };
        tracing::debug!(
            symbol = %request.symbol,
            filling = ?request.filling,
            comment = if accepted { COMMENT_CHECK_DONE } else { "Unsupported filling mode" },
            "Paper order check"
        );
        Ok(accepted)
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderResult> {
        let mut state = self.synced().await?;
        state.ensure_reachable()?;
        let capacity = state.journal_capacity;
        journal(&mut state.submitted, capacity, request);

        if let Some(comment) = state.reject_next.take() {
            return Ok(rejected(RETCODE_REJECT, &comment));
        }

        let result = match request.action {
            OrderAction::ModifyStops => state.modify(request),
            OrderAction::Deal => {
                let fill_ok = match (state.instruments.get(&request.symbol), request.filling) {
                    (None, _) => return Ok(rejected(RETCODE_REJECT, "Invalid symbol")),
                    (Some(_), None) => true,
                    (Some(instrument), Some(mode)) => instrument.filling_modes.contains(&mode),
                };
                if !fill_ok {
                    return Ok(rejected(RETCODE_INVALID_FILL, "Unsupported filling mode"));
                }
                match request.position {
                    Some(ticket) => state.close(ticket, request),
                    None => state.open(request),
                }
            }
        };

        if result.success {
            self.persist(&state).await;
        }
        Ok(result)
    }
}
