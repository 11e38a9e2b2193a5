use async_trait::async_trait;
use shared::{
    domain::{LoanId, ProfileId, Role, UserId},
    protocol::{LoanApplication, UserDetail, VerificationProfile, Wallet},
};
use tracing::warn;

use crate::{
    actions::{
        disbursement_prompt, ActionError, ActionFlow, ActionRequest, ActionTarget, FlowNotice,
    },
    error::ClientError,
    listing::{ListSource, ListView},
    resolver::{ActionKind, StatusSubject, StatusView},
    AdminApi,
};

#[async_trait]
pub trait DetailResource: Send + Sync {
    type Snapshot: Clone + Send + Sync;

    async fn fetch(&self, api: &dyn AdminApi) -> Result<Self::Snapshot, ClientError>;

    fn target(&self, snapshot: &Self::Snapshot) -> ActionTarget;

    fn confirmation_prompt(&self, _snapshot: &Self::Snapshot, request: &ActionRequest) -> String {
        request.confirmation_prompt()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoanSnapshot {
    pub loan: LoanApplication,
    /// Borrower wallet, shown next to the loan. Absent when it could not be loaded.
    pub wallet: Option<Wallet>,
}

pub struct LoanResource {
    pub id: LoanId,
}

#[async_trait]
impl DetailResource for LoanResource {
    type Snapshot = LoanSnapshot;

    async fn fetch(&self, api: &dyn AdminApi) -> Result<LoanSnapshot, ClientError> {
        let loan = api.loan_detail(&self.id).await?;
        let wallet = match &loan.user {
            Some(owner) => match api.user_wallet(owner.id()).await {
                Ok(wallet) => Some(wallet),
                Err(ClientError::Unauthorized) => return Err(ClientError::Unauthorized),
                Err(err) => {
                    warn!(loan_id = %self.id, error = %err, "loan: borrower wallet unavailable");
                    None
                }
            },
            None => None,
        };
        Ok(LoanSnapshot { loan, wallet })
    }

    fn target(&self, snapshot: &LoanSnapshot) -> ActionTarget {
        ActionTarget::of(&snapshot.loan)
    }

    fn confirmation_prompt(&self, snapshot: &LoanSnapshot, request: &ActionRequest) -> String {
        match request {
            ActionRequest::ApproveDisbursement => {
                disbursement_prompt(snapshot.loan.approved_amount)
            }
            other => other.confirmation_prompt(),
        }
    }
}

pub struct ProfileResource {
    pub id: ProfileId,
}

#[async_trait]
impl DetailResource for ProfileResource {
    type Snapshot = VerificationProfile;

    async fn fetch(&self, api: &dyn AdminApi) -> Result<VerificationProfile, ClientError> {
        api.profile_detail(&self.id).await
    }

    fn target(&self, snapshot: &VerificationProfile) -> ActionTarget {
        ActionTarget::of(snapshot)
    }
}

pub struct UserResource {
    pub id: UserId,
}

#[async_trait]
impl DetailResource for UserResource {
    type Snapshot = UserDetail;

    async fn fetch(&self, api: &dyn AdminApi) -> Result<UserDetail, ClientError> {
        api.user_detail(&self.id).await
    }

    fn target(&self, snapshot: &UserDetail) -> ActionTarget {
        ActionTarget::of(&snapshot.user)
    }
}

pub struct DetailView<R: DetailResource> {
    resource: R,
    viewer: Role,
    snapshot: Option<R::Snapshot>,
    flow: Option<ActionFlow>,
    notice: Option<FlowNotice>,
    error: Option<String>,
}

impl<R: DetailResource> DetailView<R> {
    pub fn new(resource: R, viewer: Role) -> Self {
        Self {
            resource,
            viewer,
            snapshot: None,
            flow: None,
            notice: None,
            error: None,
        }
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn snapshot(&self) -> Option<&R::Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn status_view(&self) -> Option<StatusView> {
        let target = self.resource.target(self.snapshot.as_ref()?);
        Some(crate::resolver::resolve(target.kind, &target.status, self.viewer))
    }

    /// The open confirmation, if any.
    pub fn pending(&self) -> Option<&ActionRequest> {
        self.flow.as_ref().and_then(ActionFlow::pending)
    }

    pub fn notice(&self) -> Option<&FlowNotice> {
        self.notice.as_ref()
    }

    /// Question to put to the operator for the action awaiting confirmation.
    pub fn confirmation_prompt(&self) -> Option<String> {
        let request = self.pending()?;
        let snapshot = self.snapshot.as_ref()?;
        Some(self.resource.confirmation_prompt(snapshot, request))
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub async fn load(&mut self, api: &dyn AdminApi) -> Result<(), ClientError> {
        match self.resource.fetch(api).await {
            Ok(snapshot) => {
                self.snapshot = Some(snapshot);
                self.error = None;
                Ok(())
            }
            Err(err) => {
                self.error = (!err.is_unauthorized()).then(|| err.user_message());
                Err(err)
            }
        }
    }

    pub fn begin(&mut self, request: ActionRequest) -> Result<&ActionRequest, ActionError> {
        if self
            .flow
            .as_ref()
            .is_some_and(|flow| !flow.is_idle())
        {
            return Err(ActionError::Busy);
        }
        let snapshot = self.snapshot.as_ref().ok_or(ActionError::NotLoaded)?;
        let target = self.resource.target(snapshot);
        self.notice = None;
        let flow = self.flow.insert(ActionFlow::new(target, self.viewer));
        flow.begin(request)
    }

    pub fn cancel(&mut self) {
        self.flow = None;
    }

    /// Sends the confirmed action, closes the confirmation and re-fetches authoritative state.
    pub async fn confirm(&mut self, api: &dyn AdminApi) -> Result<ActionKind, ActionError> {
        let flow = self.flow.as_mut().ok_or(ActionError::NotConfirming)?;
        let outcome = flow.confirm(api).await;
        self.notice = flow.notice().cloned();

        match &outcome {
            Err(ActionError::Api(ClientError::Unauthorized)) => {
                self.flow = None;
            }
            Ok(_) | Err(ActionError::Api(ClientError::Rejected(_))) => {
                self.flow = None;
                if let Err(err) = self.load(api).await {
                    warn!(error = %err, "view: re-fetch after action failed");
                }
            }
            Err(ActionError::Api(_)) => {
                self.flow = None;
            }
            Err(_) => {}
        }
        outcome
    }
}

pub type LoanDetailView = DetailView<LoanResource>;
pub type ProfileDetailView = DetailView<ProfileResource>;
pub type UserDetailView = DetailView<UserResource>;

impl LoanDetailView {
    pub fn for_loan(id: LoanId, viewer: Role) -> Self {
        DetailView::new(LoanResource { id }, viewer)
    }
}

impl ProfileDetailView {
    pub fn for_profile(id: ProfileId, viewer: Role) -> Self {
        DetailView::new(ProfileResource { id }, viewer)
    }
}

impl UserDetailView {
    pub fn for_user(id: UserId, viewer: Role) -> Self {
        DetailView::new(UserResource { id }, viewer)
    }
}

/// A listing whose rows can be acted on in place, such as the withdrawal queue.
pub struct ReviewQueue<S>
where
    S: ListSource,
    S::Item: StatusSubject,
{
    list: ListView<S>,
    viewer: Role,
    flow: Option<ActionFlow>,
    notice: Option<FlowNotice>,
}

impl<S> ReviewQueue<S>
where
    S: ListSource,
    S::Item: StatusSubject,
{
    pub fn new(list: ListView<S>, viewer: Role) -> Self {
        Self {
            list,
            viewer,
            flow: None,
            notice: None,
        }
    }

    pub fn list(&self) -> &ListView<S> {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut ListView<S> {
        &mut self.list
    }

    pub fn notice(&self) -> Option<&FlowNotice> {
        self.notice.as_ref()
    }

    pub fn pending(&self) -> Option<(&ActionTarget, &ActionRequest)> {
        let flow = self.flow.as_ref()?;
        flow.pending().map(|request| (flow.target(), request))
    }

    pub fn find(&self, id: &str) -> Option<&S::Item> {
        self.list.items().iter().find(|item| item.entity_id() == id)
    }

    pub async fn refresh(&mut self, api: &dyn AdminApi) -> bool {
        self.list.refresh(api).await
    }

    pub fn begin(
        &mut self,
        id: &str,
        request: ActionRequest,
    ) -> Result<&ActionRequest, ActionError> {
        if self.flow.as_ref().is_some_and(|flow| !flow.is_idle()) {
            return Err(ActionError::Busy);
        }
        let target = self
            .find(id)
            .map(ActionTarget::of)
            .ok_or(ActionError::NotLoaded)?;
        self.notice = None;
        let flow = self.flow.insert(ActionFlow::new(target, self.viewer));
        flow.begin(request)
    }

    pub fn cancel(&mut self) {
        self.flow = None;
    }

    pub async fn confirm(&mut self, api: &dyn AdminApi) -> Result<ActionKind, ActionError> {
        let flow = self.flow.as_mut().ok_or(ActionError::NotConfirming)?;
        let outcome = flow.confirm(api).await;
        self.notice = flow.notice().cloned();

        match &outcome {
            Err(ActionError::Api(ClientError::Unauthorized)) => self.flow = None,
            Ok(_) | Err(ActionError::Api(ClientError::Rejected(_))) => {
                self.flow = None;
                self.list.refresh(api).await;
            }
            Err(ActionError::Api(_)) => self.flow = None,
            Err(_) => {}
        }
        outcome
    }
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;
