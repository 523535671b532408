//! Admin form state machine.
//!
//! ```text
//! Loading ──load ok──▶ Ready ──submit──▶ Saving ──ok──▶ Ready { Saved }
//!                        ▲                  └──err──▶ Ready { Failed } (draft kept)
//!                        └──── validation error (no store call) ────┘
//! ```
//!
//! `submit` is the only transition that touches the store.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::admin::draft::{DraftOp, FormError, PackageDraft};
use crate::models::package::PackageRecord;
use crate::store::PackageStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "id", rename_all = "camelCase")]
pub enum FormMode {
    Create,
    Edit(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notice {
    Saved { message: String },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum FormState {
    Loading,
    Ready { notice: Option<Notice> },
    Saving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum SubmitOutcome {
    Created { id: Uuid },
    Updated { id: Uuid },
}

impl SubmitOutcome {
    pub fn id(&self) -> Uuid {
        match self {
            SubmitOutcome::Created { id } | SubmitOutcome::Updated { id } => *id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdminForm {
    mode: FormMode,
    state: FormState,
    draft: PackageDraft,
}

impl AdminForm {
    /// "New package" form, ready immediately.
    pub fn create() -> Self {
        Self {
            mode: FormMode::Create,
            state: FormState::Ready { notice: None },
            draft: PackageDraft::default(),
        }
    }

    /// Edit form that still has to fetch its record.
    pub fn loading(id: Uuid) -> Self {
        Self {
            mode: FormMode::Edit(id),
            state: FormState::Loading,
            draft: PackageDraft::default(),
        }
    }

    /// `loading` followed by `finish_loading`.
    pub async fn load(store: &dyn PackageStore, id: Uuid) -> Result<Self, FormError> {
        let mut form = Self::loading(id);
        form.finish_loading(store).await?;
        Ok(form)
    }

    pub async fn finish_loading(&mut self, store: &dyn PackageStore) -> Result<(), FormError> {
        let FormMode::Edit(id) = self.mode else {
            return Ok(());
        };
        if self.state != FormState::Loading {
            return Ok(());
        }
        let document = store.get(id).await?.ok_or(FormError::NotFound(id))?;
        self.draft = PackageDraft::from_record(&PackageRecord::from_document(&document));
        self.state = FormState::Ready { notice: None };
        Ok(())
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn draft(&self) -> &PackageDraft {
        &self.draft
    }

    fn ensure_ready(&self) -> Result<(), FormError> {
        match self.state {
            FormState::Ready { .. } => Ok(()),
            FormState::Loading | FormState::Saving => Err(FormError::Busy),
        }
    }

    pub fn apply(&mut self, op: &DraftOp) -> Result<(), FormError> {
        self.ensure_ready()?;
        self.draft = self.draft.apply(op)?;
        Ok(())
    }

    /// Swaps in a whole draft, as when the admin screen posts its form.
    pub fn replace_draft(&mut self, draft: PackageDraft) -> Result<(), FormError> {
        self.ensure_ready()?;
        self.draft = draft;
        Ok(())
    }

    /// Validates, normalizes and writes the draft.
    ///
    /// Validation failures never reach the store. On any failure the draft is
    /// left exactly as it was so the admin can fix it and retry. After a
    /// successful create the form switches to editing the new record.
    pub async fn submit(&mut self, store: &dyn PackageStore) -> Result<SubmitOutcome, FormError> {
        self.ensure_ready()?;

        let fields = match self.draft.to_fields() {
            Ok(fields) => fields,
            Err(e) => return Err(self.fail(e)),
        };
        let data = match fields.to_document_data() {
            Ok(data) => data,
            Err(e) => return Err(self.fail(FormError::Store(e.into()))),
        };

        self.state = FormState::Saving;
        let result = match self.mode {
            FormMode::Create => store
                .create(data)
                .await
                .map(|id| SubmitOutcome::Created { id }),
            FormMode::Edit(id) => store
                .update(id, data)
                .await
                .map(|()| SubmitOutcome::Updated { id }),
        };

        match result {
            Ok(outcome) => {
                info!("Package {} saved ({outcome:?})", outcome.id());
                self.mode = FormMode::Edit(outcome.id());
                self.state = FormState::Ready {
                    notice: Some(Notice::Saved {
                        message: "Package saved successfully".to_string(),
                    }),
                };
                Ok(outcome)
            }
            Err(e) => {
                warn!("Failed to save package: {e}");
                Err(self.fail(e.into()))
            }
        }
    }

    fn fail(&mut self, error: FormError) -> FormError {
        self.state = FormState::Ready {
            notice: Some(Notice::Failed {
                message: error.to_string(),
            }),
        };
        error
    }
}
