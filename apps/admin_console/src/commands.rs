use anyhow::{bail, Context, Result};
use client_core::{
    actions::{parse_loan_amount, ActionRequest},
    format::{
        format_currency, format_date, format_date_time, format_optional_currency, format_phone,
    },
    listing::{
        AllLoans, ListSource, ListView, PendingDisbursementLoans, PendingProfiles,
        PendingVerificationLoans, Transactions, Users, Withdrawals,
    },
    resolver::{transaction_type_label, StatusSubject},
    views::{
        DetailResource, DetailView, LoanDetailView, ProfileDetailView, ReviewQueue, UserDetailView,
    },
    AdminApi, AdminClient, ClientError,
};
use shared::{
    domain::{LoanId, LoanStatus, ProfileId, Role, TransactionType, UserId, WithdrawalStatus},
    protocol::{
        LoanApplication, Transaction, UserRef, UserSummary, VerificationProfile, WithdrawalRequest,
    },
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

pub struct Console {
    client: AdminClient,
    viewer: Role,
    assume_yes: bool,
}

fn owner(user: Option<&UserRef>) -> String {
    user.map(UserRef::display_name).unwrap_or_else(|| "-".to_string())
}

fn badge<S: StatusSubject>(subject: &S, viewer: Role) -> String {
    let view = subject.status_view(viewer);
    format!("{} [{}]", view.label, view.badge)
}

fn actions_line<S: StatusSubject>(subject: &S, viewer: Role) -> String {
    let view = subject.status_view(viewer);
    if view.permitted.is_empty() {
        return "none".to_string();
    }
    view.permitted
        .iter()
        .map(|action| action.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Turns the outcome of the latest fetch into an error before anything is printed.
pub(crate) fn settled<S: ListSource>(view: ListView<S>) -> Result<ListView<S>> {
    if view.is_expired() {
        return Err(ClientError::Unauthorized.into());
    }
    if let Some(message) = view.error() {
        bail!("{message}");
    }
    Ok(view)
}

fn print_pagination<S: ListSource>(view: &ListView<S>) {
    let pagination = view.pagination();
    println!(
        "page {} of {} ({} total)",
        view.page(),
        pagination.pages.max(1),
        pagination.total
    );
}

fn loan_row(loan: &LoanApplication, viewer: Role) {
    println!(
        "{:<26} {:<14} {:<24} {:>14} {:<28} {}",
        loan.id,
        loan.loan_number.as_deref().unwrap_or("-"),
        owner(loan.user.as_ref()),
        format_currency(loan.requested_amount),
        badge(loan, viewer),
        format_date(loan.created_at),
    );
}

fn profile_row(profile: &VerificationProfile, viewer: Role) {
    println!(
        "{:<26} {:<24} {:<12} {:<22} {}",
        profile.id,
        owner(profile.user.as_ref()),
        profile.register_number.as_deref().unwrap_or("-"),
        badge(profile, viewer),
        format_date(profile.created_at),
    );
}

fn withdrawal_row(item: &WithdrawalRequest, viewer: Role) {
    println!(
        "{:<26} {:<24} {:>12} {:>10} {:<18} {:<22} {}",
        item.id,
        owner(item.user.as_ref()),
        format_currency(item.amount),
        format_currency(item.fee),
        item.bank_name.as_deref().unwrap_or("-"),
        badge(item, viewer),
        format_date_time(item.created_at),
    );
}

fn transaction_row(item: &Transaction, viewer: Role) {
    println!(
        "{:<26} {:<24} {:<18} {:>14} {:<20} {}",
        item.id,
        owner(item.user.as_ref()),
        transaction_type_label(&item.kind),
        format_currency(item.amount),
        badge(item, viewer),
        format_date_time(item.created_at),
    );
}

fn user_row(user: &UserSummary, viewer: Role) {
    println!(
        "{:<26} {:<24} {:<10} {:<6} {:<20} {}",
        user.id,
        user.full_name(),
        format_phone(&user.phone),
        if user.is_verified { "yes" } else { "no" },
        badge(user, viewer),
        format_date(user.created_at),
    );
}

impl Console {
    pub fn new(client: AdminClient, viewer: Role, assume_yes: bool) -> Self {
        Self {
            client,
            viewer,
            assume_yes,
        }
    }

    fn api(&self) -> &dyn AdminApi {
        &self.client
    }

    async fn confirm_prompt(&self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        let mut stdout = tokio::io::stdout();
        stdout.write_all(format!("{prompt} [y/N] ").as_bytes()).await?;
        stdout.flush().await?;
        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .context("failed to read confirmation")?;
        Ok(matches!(line.trim(), "y" | "Y" | "yes"))
    }

    async fn fetch_page<S: ListSource>(
        &self,
        mut view: ListView<S>,
        page: u32,
    ) -> Result<ListView<S>> {
        let ticket = view.set_page(page);
        view.load(self.api(), ticket).await;
        settled(view)
    }

    async fn run_action<R: DetailResource>(
        &self,
        mut view: DetailView<R>,
        request: ActionRequest,
    ) -> Result<()> {
        view.load(self.api()).await?;
        view.begin(request)?;
        let prompt = view.confirmation_prompt().unwrap_or_default();
        if !self.confirm_prompt(&prompt).await? {
            view.cancel();
            println!("Cancelled; nothing was sent.");
            return Ok(());
        }
        let kind = view.confirm(self.api()).await?;
        info!(action = %kind, "console: action accepted");
        if let Some(status) = view.status_view() {
            println!("Done ({kind}). Status is now {} [{}].", status.label, status.badge);
        } else {
            println!("Done ({kind}).");
        }
        Ok(())
    }

    pub async fn dashboard(&self) -> Result<()> {
        let stats = self.api().dashboard().await?;
        println!(
            "Users:        {} total, {} active, {} verified",
            stats.users.total, stats.users.active, stats.users.verified
        );
        println!(
            "Loans:        {} total, {} pending, {} active, {} disbursed, {} paid, {} overdue",
            stats.loans.total,
            stats.loans.pending,
            stats.loans.active,
            stats.loans.disbursed,
            stats.loans.paid,
            stats.loans.overdue
        );
        println!("Wallets:      {}", format_currency(stats.wallets.total_balance));
        println!("Withdrawals:  {} pending", stats.withdrawals.pending);
        Ok(())
    }

    pub async fn list_users(&self, page: u32, search: Option<String>) -> Result<()> {
        let view = self
            .fetch_page(ListView::with_filter(Users, search), page)
            .await?;
        for user in view.items() {
            user_row(user, self.viewer);
        }
        print_pagination(&view);
        Ok(())
    }

    pub async fn show_user(&self, id: UserId) -> Result<()> {
        let mut view = UserDetailView::for_user(id, self.viewer);
        view.load(self.api()).await?;
        let Some(detail) = view.snapshot() else {
            return Ok(());
        };
        let user = &detail.user;
        println!("{} ({})", user.full_name(), user.id);
        println!("phone:    {}", format_phone(&user.phone));
        println!("email:    {}", user.email.as_deref().unwrap_or("-"));
        println!("role:     {:?}", user.role);
        println!("status:   {}", badge(user, self.viewer));
        println!("verified: {}", if user.is_verified { "yes" } else { "no" });
        println!("joined:   {}", format_date(user.created_at));
        println!("last in:  {}", format_date_time(user.last_login));
        if let Some(wallet) = &detail.wallet {
            println!("wallet:   {}", format_currency(wallet.balance));
        }
        if let Some(profile) = &detail.profile {
            println!(
                "profile:  {} (limit {})",
                badge(profile, self.viewer),
                format_optional_currency(profile.loan_limit)
            );
        }
        if !detail.loans.is_empty() {
            println!("loans:");
            for loan in &detail.loans {
                loan_row(loan, self.viewer);
            }
        }
        if !detail.transactions.is_empty() {
            println!("recent transactions:");
            for item in &detail.transactions {
                transaction_row(item, self.viewer);
            }
        }
        println!("actions:  {}", actions_line(user, self.viewer));
        Ok(())
    }

    pub async fn toggle_user(&self, id: UserId) -> Result<()> {
        self.run_action(
            UserDetailView::for_user(id, self.viewer),
            ActionRequest::ToggleUserStatus,
        )
        .await
    }

    pub async fn pending_profiles(&self, page: u32) -> Result<()> {
        let view = self.fetch_page(ListView::new(PendingProfiles), page).await?;
        for profile in view.items() {
            profile_row(profile, self.viewer);
        }
        print_pagination(&view);
        Ok(())
    }

    pub async fn show_profile(&self, id: ProfileId) -> Result<()> {
        let mut view = ProfileDetailView::for_profile(id, self.viewer);
        view.load(self.api()).await?;
        let Some(profile) = view.snapshot() else {
            return Ok(());
        };
        println!("profile {} of {}", profile.id, owner(profile.user.as_ref()));
        if let Some(phone) = profile.user.as_ref().and_then(UserRef::phone) {
            println!("phone:      {}", format_phone(phone));
        }
        println!("register:   {}", profile.register_number.as_deref().unwrap_or("-"));
        println!("born:       {}", format_date(profile.date_of_birth));
        if let Some(address) = &profile.address {
            println!(
                "address:    {}, {}, {}, {}",
                address.city, address.district, address.khoroo, address.street
            );
        }
        if let Some(employment) = &profile.employment {
            println!(
                "employment: {} {} {}",
                employment.status,
                employment.company_name.as_deref().unwrap_or(""),
                format_optional_currency(employment.monthly_income)
            );
        }
        if let Some(contact) = &profile.emergency_contact {
            println!(
                "emergency:  {} ({}) {}",
                contact.name,
                contact.relationship,
                format_phone(&contact.phone)
            );
        }
        if let Some(bank) = &profile.bank_account {
            println!(
                "bank:       {} {} {}",
                bank.bank_name, bank.account_number, bank.account_name
            );
        }
        println!("status:     {}", badge(profile, self.viewer));
        if let Some(reason) = &profile.rejection_reason {
            println!("rejected:   {reason}");
        }
        println!("actions:    {}", actions_line(profile, self.viewer));
        Ok(())
    }

    pub async fn verify_profile(&self, id: ProfileId, loan_limit: Option<i64>) -> Result<()> {
        self.run_action(
            ProfileDetailView::for_profile(id, self.viewer),
            ActionRequest::VerifyProfile { loan_limit },
        )
        .await
    }

    pub async fn reject_profile(&self, id: ProfileId, reason: String) -> Result<()> {
        self.run_action(
            ProfileDetailView::for_profile(id, self.viewer),
            ActionRequest::RejectProfile { reason },
        )
        .await
    }

    pub async fn list_loans(&self, page: u32, status: Option<LoanStatus>) -> Result<()> {
        let view = self
            .fetch_page(ListView::with_filter(AllLoans, status), page)
            .await?;
        for loan in view.items() {
            loan_row(loan, self.viewer);
        }
        print_pagination(&view);
        Ok(())
    }

    pub async fn pending_verification_loans(&self, page: u32) -> Result<()> {
        let view = self
            .fetch_page(ListView::new(PendingVerificationLoans), page)
            .await?;
        for loan in view.items() {
            loan_row(loan, self.viewer);
        }
        print_pagination(&view);
        Ok(())
    }

    pub async fn pending_disbursement_loans(&self, page: u32) -> Result<()> {
        let view = self
            .fetch_page(ListView::new(PendingDisbursementLoans), page)
            .await?;
        for loan in view.items() {
            loan_row(loan, self.viewer);
        }
        print_pagination(&view);
        Ok(())
    }

    pub async fn show_loan(&self, id: LoanId) -> Result<()> {
        let mut view = LoanDetailView::for_loan(id, self.viewer);
        view.load(self.api()).await?;
        let Some(snapshot) = view.snapshot() else {
            return Ok(());
        };
        let loan = &snapshot.loan;
        println!(
            "loan {} ({})",
            loan.id,
            loan.loan_number.as_deref().unwrap_or("-")
        );
        println!("borrower:   {}", owner(loan.user.as_ref()));
        println!("requested:  {}", format_currency(loan.requested_amount));
        println!("approved:   {}", format_optional_currency(loan.approved_amount));
        println!("disbursed:  {}", format_optional_currency(loan.disbursed_amount));
        println!("repayment:  {}", format_optional_currency(loan.total_repayment));
        println!("paid:       {}", format_optional_currency(loan.paid_amount));
        println!("remaining:  {}", format_optional_currency(loan.remaining_amount));
        if let (Some(rate), Some(term)) = (loan.interest_rate, loan.term) {
            println!("terms:      {rate}% over {term} days");
        }
        println!("status:     {}", badge(loan, self.viewer));
        println!("applied:    {}", format_date_time(loan.created_at));
        println!("fee paid:   {}", format_date_time(loan.verification_paid_at));
        println!("due:        {}", format_date(loan.due_date));
        if let Some(reason) = &loan.rejection_reason {
            println!("rejected:   {reason}");
        }
        if let Some(notes) = &loan.admin_notes {
            println!("notes:      {notes}");
        }
        match &snapshot.wallet {
            Some(wallet) => println!("wallet:     {}", format_currency(wallet.balance)),
            None => println!("wallet:     unavailable"),
        }
        println!("actions:    {}", actions_line(loan, self.viewer));
        Ok(())
    }

    pub async fn approve_loan(&self, id: LoanId, amount: &str) -> Result<()> {
        let amount = parse_loan_amount(amount)?;
        self.run_action(
            LoanDetailView::for_loan(id, self.viewer),
            ActionRequest::ApproveLoan { amount },
        )
        .await
    }

    pub async fn reject_loan(&self, id: LoanId, reason: String) -> Result<()> {
        self.run_action(
            LoanDetailView::for_loan(id, self.viewer),
            ActionRequest::RejectLoan { reason },
        )
        .await
    }

    pub async fn disburse_loan(&self, id: LoanId) -> Result<()> {
        self.run_action(
            LoanDetailView::for_loan(id, self.viewer),
            ActionRequest::ApproveDisbursement,
        )
        .await
    }

    pub async fn list_withdrawals(
        &self,
        page: u32,
        status: Option<WithdrawalStatus>,
    ) -> Result<()> {
        let view = self
            .fetch_page(ListView::with_filter(Withdrawals, status), page)
            .await?;
        for item in view.items() {
            withdrawal_row(item, self.viewer);
        }
        print_pagination(&view);
        Ok(())
    }

    /// Finds the request among pending withdrawals, then acts on it in place.
    pub async fn act_on_withdrawal(&self, id: &str, request: ActionRequest) -> Result<()> {
        let list = ListView::with_filter(Withdrawals, Some(WithdrawalStatus::Pending));
        let mut queue = ReviewQueue::new(list, self.viewer);
        queue.refresh(self.api()).await;
        while queue.find(id).is_none() {
            if queue.list().is_expired() {
                return Err(ClientError::Unauthorized.into());
            }
            if let Some(message) = queue.list().error() {
                bail!("{message}");
            }
            let Some(ticket) = queue.list_mut().next_page() else {
                bail!("withdrawal {id} is not among pending requests");
            };
            queue.list_mut().load(self.api(), ticket).await;
        }

        let prompt = queue.begin(id, request)?.confirmation_prompt();
        if let Some(item) = queue.find(id) {
            println!(
                "{} requests {} to {} {}",
                owner(item.user.as_ref()),
                format_currency(item.amount),
                item.bank_name.as_deref().unwrap_or("-"),
                item.account_number.as_deref().unwrap_or("")
            );
        }
        if !self.confirm_prompt(&prompt).await? {
            queue.cancel();
            println!("Cancelled; nothing was sent.");
            return Ok(());
        }
        let kind = queue.confirm(self.api()).await?;
        info!(action = %kind, withdrawal_id = id, "console: action accepted");
        println!("Done ({kind}).");
        Ok(())
    }

    pub async fn list_transactions(&self, page: u32, kind: Option<TransactionType>) -> Result<()> {
        let view = self
            .fetch_page(ListView::with_filter(Transactions, kind), page)
            .await?;
        for item in view.items() {
            transaction_row(item, self.viewer);
        }
        print_pagination(&view);
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
