use async_trait::async_trait;
use shared::{
    domain::{LoanStatus, TransactionType, WithdrawalStatus},
    protocol::{
        LoanApplication, Page, Pagination, Transaction, UserSummary, VerificationProfile,
        WithdrawalRequest,
    },
};
use tracing::debug;

use crate::{error::ClientError, AdminApi};

/// Filter type for listings that take none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoFilter {}

#[async_trait]
pub trait ListSource: Send + Sync {
    type Item: Clone + Send + Sync;
    type Filter: Clone + PartialEq + Send + Sync;

    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        api: &dyn AdminApi,
        page: u32,
        filter: Option<&Self::Filter>,
    ) -> Result<Page<Self::Item>, ClientError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllLoans;

#[async_trait]
impl ListSource for AllLoans {
    type Item = LoanApplication;
    type Filter = LoanStatus;

    fn name(&self) -> &'static str {
        "loans"
    }

    async fn fetch(
        &self,
        api: &dyn AdminApi,
        page: u32,
        filter: Option<&LoanStatus>,
    ) -> Result<Page<LoanApplication>, ClientError> {
        api.list_loans(page, filter.copied()).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PendingVerificationLoans;

#[async_trait]
impl ListSource for PendingVerificationLoans {
    type Item = LoanApplication;
    type Filter = NoFilter;

    fn name(&self) -> &'static str {
        "pending_verification_loans"
    }

    async fn fetch(
        &self,
        api: &dyn AdminApi,
        page: u32,
        _filter: Option<&NoFilter>,
    ) -> Result<Page<LoanApplication>, ClientError> {
        api.list_pending_verification_loans(page).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PendingDisbursementLoans;

#[async_trait]
impl ListSource for PendingDisbursementLoans {
    type Item = LoanApplication;
    type Filter = NoFilter;

    fn name(&self) -> &'static str {
        "pending_disbursement_loans"
    }

    async fn fetch(
        &self,
        api: &dyn AdminApi,
        page: u32,
        _filter: Option<&NoFilter>,
    ) -> Result<Page<LoanApplication>, ClientError> {
        api.list_pending_disbursement_loans(page).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PendingProfiles;

#[async_trait]
impl ListSource for PendingProfiles {
    type Item = VerificationProfile;
    type Filter = NoFilter;

    fn name(&self) -> &'static str {
        "pending_profiles"
    }

    async fn fetch(
        &self,
        api: &dyn AdminApi,
        page: u32,
        _filter: Option<&NoFilter>,
    ) -> Result<Page<VerificationProfile>, ClientError> {
        api.list_pending_profiles(page).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Withdrawals;

#[async_trait]
impl ListSource for Withdrawals {
    type Item = WithdrawalRequest;
    type Filter = WithdrawalStatus;

    fn name(&self) -> &'static str {
        "withdrawals"
    }

    async fn fetch(
        &self,
        api: &dyn AdminApi,
        page: u32,
        filter: Option<&WithdrawalStatus>,
    ) -> Result<Page<WithdrawalRequest>, ClientError> {
        api.list_withdrawals(page, filter.copied()).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Transactions;

#[async_trait]
impl ListSource for Transactions {
    type Item = Transaction;
    type Filter = TransactionType;

    fn name(&self) -> &'static str {
        "transactions"
    }

    async fn fetch(
        &self,
        api: &dyn AdminApi,
        page: u32,
        filter: Option<&TransactionType>,
    ) -> Result<Page<Transaction>, ClientError> {
        api.list_transactions(page, filter.copied()).await
    }
}

/// Users filtered by a free-text search over name and phone.
#[derive(Debug, Clone, Copy, Default)]
pub struct Users;

#[async_trait]
impl ListSource for Users {
    type Item = UserSummary;
    type Filter = String;

    fn name(&self) -> &'static str {
        "users"
    }

    async fn fetch(
        &self,
        api: &dyn AdminApi,
        page: u32,
        filter: Option<&String>,
    ) -> Result<Page<UserSummary>, ClientError> {
        api.list_users(page, filter.map(String::as_str)).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery<F> {
    pub page: u32,
    pub filter: Option<F>,
}

/// Identifies one issued fetch. Only the most recently issued ticket may update the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket<F> {
    seq: u64,
    query: ListQuery<F>,
}

impl<F> FetchTicket<F> {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn page(&self) -> u32 {
        self.query.page
    }

    pub fn filter(&self) -> Option<&F> {
        self.query.filter.as_ref()
    }
}

#[derive(Debug)]
pub struct ListView<S: ListSource> {
    source: S,
    query: ListQuery<S::Filter>,
    items: Vec<S::Item>,
    pagination: Pagination,
    latest_seq: u64,
    loading: bool,
    expired: bool,
    error: Option<String>,
}

impl<S: ListSource> ListView<S> {
    pub fn new(source: S) -> Self {
        Self::with_filter(source, None)
    }

    pub fn with_filter(source: S, filter: Option<S::Filter>) -> Self {
        Self {
            source,
            query: ListQuery { page: 1, filter },
            items: Vec::new(),
            pagination: Pagination::default(),
            latest_seq: 0,
            loading: false,
            expired: false,
            error: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn page(&self) -> u32 {
        self.query.page
    }

    pub fn filter(&self) -> Option<&S::Filter> {
        self.query.filter.as_ref()
    }

    pub fn items(&self) -> &[S::Item] {
        &self.items
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True when the latest fetch was refused with a 401. The rows are not current.
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn has_next(&self) -> bool {
        self.query.page < self.pagination.pages
    }

    pub fn has_prev(&self) -> bool {
        self.query.page > 1
    }

    /// Issues a ticket for the current query and supersedes every earlier ticket.
    pub fn begin_fetch(&mut self) -> FetchTicket<S::Filter> {
        self.latest_seq += 1;
        self.loading = true;
        FetchTicket {
            seq: self.latest_seq,
            query: self.query.clone(),
        }
    }

    /// Changes the filter. The page always returns to 1.
    pub fn set_filter(&mut self, filter: Option<S::Filter>) -> FetchTicket<S::Filter> {
        self.query = ListQuery { page: 1, filter };
        self.begin_fetch()
    }

    pub fn set_page(&mut self, page: u32) -> FetchTicket<S::Filter> {
        self.query.page = page.max(1);
        self.begin_fetch()
    }

    pub fn next_page(&mut self) -> Option<FetchTicket<S::Filter>> {
        if !self.has_next() {
            return None;
        }
        Some(self.set_page(self.query.page + 1))
    }

    pub fn prev_page(&mut self) -> Option<FetchTicket<S::Filter>> {
        if !self.has_prev() {
            return None;
        }
        Some(self.set_page(self.query.page - 1))
    }

    /// Applies a response if its ticket is still current. Returns whether it was applied.
    pub fn apply(
        &mut self,
        ticket: FetchTicket<S::Filter>,
        result: Result<Page<S::Item>, ClientError>,
    ) -> bool {
        if ticket.seq != self.latest_seq {
            debug!(
                list = self.source.name(),
                stale_seq = ticket.seq,
                latest_seq = self.latest_seq,
                "list: discarding stale response"
            );
            return false;
        }
        self.loading = false;
        match result {
            Ok(page) => {
                self.items = page.items;
                self.pagination = page.pagination;
                self.expired = false;
                self.error = None;
            }
            Err(ClientError::Unauthorized) => {
                self.items.clear();
                self.pagination = Pagination::default();
                self.expired = true;
                self.error = None;
            }
            Err(err) => {
                self.error = Some(err.user_message());
            }
        }
        true
    }

    pub async fn load(&mut self, api: &dyn AdminApi, ticket: FetchTicket<S::Filter>) -> bool {
        let result = self
            .source
            .fetch(api, ticket.page(), ticket.filter())
            .await;
        self.apply(ticket, result)
    }

    pub async fn refresh(&mut self, api: &dyn AdminApi) -> bool {
        let ticket = self.begin_fetch();
        self.load(api, ticket).await
    }
}

#[cfg(test)]
#[path = "tests/listing_tests.rs"]
mod tests;
