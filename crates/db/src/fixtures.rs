use chrono::NaiveDate;
use rust_decimal::Decimal;

use rfq_tracker_core::domain::quotation::{ApprovalStatus, NewQuotation, QuotationPatch};
use rfq_tracker_core::domain::rfq::{NewRfq, Priority, RfqStatus};
use rfq_tracker_core::domain::user::{NewUser, Role, User};
use rfq_tracker_core::errors::DomainError;
use rfq_tracker_core::lifecycle::{LifecycleManager, TransitionRequest};

use crate::connection::DbPool;
use crate::repositories::{
    QuotationRepository, RepositoryError, RfqRepository, SqlQuotationRepository,
    SqlRfqRepository, SqlUserRepository, UserRepository,
};

struct SeedUser {
    username: &'static str,
    full_name: &'static str,
    role: Role,
}

const SEED_USERS: &[SeedUser] = &[
    SeedUser { username: "admin", full_name: "System Administrator", role: Role::Admin },
    SeedUser { username: "sales.priya", full_name: "Priya Nair", role: Role::Sales },
    SeedUser { username: "sales.arjun", full_name: "Arjun Mehta", role: Role::Sales },
    SeedUser { username: "eng.kavya", full_name: "Kavya Rao", role: Role::Engineer },
    SeedUser { username: "eng.vikram", full_name: "Vikram Singh", role: Role::Engineer },
    SeedUser { username: "mgmt.anita", full_name: "Anita Desai", role: Role::Management },
];

struct SeedQuotation {
    amount: i64,
    approved: bool,
}

struct SeedRfq {
    customer_name: &'static str,
    product: &'static str,
    category: &'static str,
    priority: Priority,
    received: (i32, u32, u32),
    due: Option<(i32, u32, u32)>,
    estimated_value: i64,
    sales: &'static str,
    engineer: Option<&'static str>,
    quotations: &'static [SeedQuotation],
    /// Statuses applied in order after creation, with the reason for the ones that need it.
    path: &'static [(RfqStatus, Option<&'static str>)],
}

impl SeedRfq {
    fn final_status(&self) -> RfqStatus {
        self.path.last().map_or(RfqStatus::Enquiry, |(status, _)| *status)
    }
}

const SEED_RFQS: &[SeedRfq] = &[
    SeedRfq {
        customer_name: "ABC Manufacturing Ltd.",
        product: "Conveyor PLC upgrade",
        category: "Automation",
        priority: Priority::High,
        received: (2026, 1, 12),
        due: Some((2026, 2, 15)),
        estimated_value: 1_250_000,
        sales: "sales.priya",
        engineer: Some("eng.kavya"),
        quotations: &[],
        path: &[],
    },
    SeedRfq {
        customer_name: "Sunrise Textiles",
        product: "Dyeing line SCADA",
        category: "Software",
        priority: Priority::Medium,
        received: (2026, 1, 20),
        due: Some((2026, 3, 1)),
        estimated_value: 780_000,
        sales: "sales.priya",
        engineer: Some("eng.vikram"),
        quotations: &[SeedQuotation { amount: 820_000, approved: false }],
        path: &[(RfqStatus::UnderReview, None), (RfqStatus::QuotationSent, None)],
    },
    SeedRfq {
        customer_name: "Coastal Pumps Pvt Ltd",
        product: "Pump station retrofit",
        category: "Electrical",
        priority: Priority::Critical,
        received: (2026, 2, 3),
        due: Some((2026, 3, 10)),
        estimated_value: 2_400_000,
        sales: "sales.arjun",
        engineer: Some("eng.kavya"),
        quotations: &[
            SeedQuotation { amount: 2_550_000, approved: false },
            SeedQuotation { amount: 2_380_000, approved: false },
        ],
        path: &[(RfqStatus::QuotationSent, None), (RfqStatus::Negotiation, None)],
    },
    SeedRfq {
        customer_name: "Metro Cold Storage",
        product: "Refrigeration controls",
        category: "Automation",
        priority: Priority::Medium,
        received: (2026, 2, 18),
        due: None,
        estimated_value: 960_000,
        sales: "sales.arjun",
        engineer: Some("eng.vikram"),
        quotations: &[SeedQuotation { amount: 940_000, approved: true }],
        path: &[(RfqStatus::QuotationSent, None), (RfqStatus::Won, None)],
    },
    SeedRfq {
        customer_name: "Greenfield Agro Foods",
        product: "Packaging line vision system",
        category: "Software",
        priority: Priority::Low,
        received: (2026, 3, 2),
        due: None,
        estimated_value: 450_000,
        sales: "sales.priya",
        engineer: None,
        quotations: &[SeedQuotation { amount: 510_000, approved: false }],
        path: &[(RfqStatus::QuotationSent, None), (RfqStatus::Lost, Some("price too high"))],
    },
];

/// Deterministic demo dataset loaded through the repositories, so numbering, audit entries and
/// notifications are produced by the same code paths the API uses.
pub struct DemoDataset;

impl DemoDataset {
    /// Loads the dataset unless the demo admin already exists, in which case nothing is written.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let users_repo = SqlUserRepository::new(pool.clone());
        if users_repo.find_by_username(SEED_USERS[0].username).await?.is_some() {
            return Ok(SeedResult {
                already_seeded: true,
                users_created: 0,
                rfqs_created: 0,
                quotations_created: 0,
            });
        }

        let mut users = Vec::with_capacity(SEED_USERS.len());
        for seed in SEED_USERS {
            let user = users_repo
                .create(NewUser {
                    username: seed.username.to_string(),
                    email: format!("{}@rfq-tracker.local", seed.username),
                    full_name: seed.full_name.to_string(),
                    role: seed.role,
                })
                .await?;
            users.push(user);
        }

        let rfqs = SqlRfqRepository::new(pool.clone());
        let quotations = SqlQuotationRepository::new(pool.clone());
        let manager = LifecycleManager::new(&rfqs);
        let mut quotations_created = 0;

        for seed in SEED_RFQS {
            let sales = find_user(&users, seed.sales)?;
            let engineer = seed.engineer.map(|name| find_user(&users, name)).transpose()?;
            let rfq = rfqs
                .create(NewRfq {
                    customer_name: seed.customer_name.to_string(),
                    customer_contact_person: None,
                    email: None,
                    phone: None,
                    company_name: Some(seed.customer_name.to_string()),
                    product_project_name: Some(seed.product.to_string()),
                    rfq_category: Some(seed.category.to_string()),
                    rfq_source: Some("Email".to_string()),
                    priority: seed.priority,
                    rfq_received_date: seed_date(seed.received)?,
                    rfq_due_date: seed.due.map(seed_date).transpose()?,
                    expected_order_date: None,
                    estimated_project_value: Some(Decimal::from(seed.estimated_value)),
                    currency: "INR".to_string(),
                    status: RfqStatus::Enquiry,
                    assigned_engineer_id: engineer.map(|user| user.id.clone()),
                    assigned_sales_person_id: Some(sales.id.clone()),
                    created_by: sales.id.clone(),
                    reason_for_lost_on_hold: None,
                    remarks_notes: None,
                })
                .await?;

            for quotation in seed.quotations {
                let created = quotations
                    .create(NewQuotation {
                        rfq_id: rfq.id.clone(),
                        quotation_sent_date: Some(seed_date(seed.received)?),
                        quoted_amount: Decimal::from(quotation.amount),
                        material_cost: None,
                        engineering_cost: None,
                        software_cost: None,
                        installation_cost: None,
                        margin: None,
                        validity_date: None,
                        approval_status: ApprovalStatus::Pending,
                        created_by: sales.id.clone(),
                    })
                    .await?;
                quotations_created += 1;
                if quotation.approved {
                    quotations
                        .update(
                            &created.id,
                            &QuotationPatch {
                                approval_status: Some(ApprovalStatus::Approved),
                                final_approved_amount: Some(Decimal::from(quotation.amount)),
                                ..QuotationPatch::default()
                            },
                        )
                        .await?;
                }
            }

            let mut current = rfq;
            for (status, reason) in seed.path {
                let mut request = TransitionRequest::new(*status);
                if let Some(reason) = reason {
                    request = request.with_reason(*reason);
                }
                current = manager
                    .transition(&current, request, &sales.actor())
                    .await?
                    .into_rfq();
            }
        }

        tracing::info!(
            event_name = "fixtures.demo_loaded",
            users = users.len(),
            rfqs = SEED_RFQS.len(),
            quotations = quotations_created,
            "demo dataset loaded"
        );
        Ok(SeedResult {
            already_seeded: false,
            users_created: users.len(),
            rfqs_created: SEED_RFQS.len(),
            quotations_created,
        })
    }

    /// Checks that every demo user and RFQ is present with the expected shape.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for seed in SEED_USERS {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 AND role = ?2 AND is_active = 1)",
            )
            .bind(seed.username)
            .bind(seed.role.as_str())
            .fetch_one(pool)
            .await?;
            checks.push((seed.username, exists == 1));
        }

        for seed in SEED_RFQS {
            let row: Option<(String, String)> =
                sqlx::query_as("SELECT id, status FROM rfqs WHERE customer_name = ?1")
                    .bind(seed.customer_name)
                    .fetch_optional(pool)
                    .await?;
            let Some((id, status)) = row else {
                checks.push((seed.customer_name, false));
                continue;
            };
            checks.push((seed.customer_name, status == seed.final_status().as_str()));

            let quotation_count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM quotations WHERE rfq_id = ?1")
                    .bind(&id)
                    .fetch_one(pool)
                    .await?;
            checks.push(("quotation count", quotation_count == seed.quotations.len() as i64));

            let audit_count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM status_audit_log WHERE rfq_id = ?1")
                    .bind(&id)
                    .fetch_one(pool)
                    .await?;
            checks.push(("audit trail", audit_count == seed.path.len() as i64 + 1));

            if seed.final_status().raises_notification() {
                let notified: i64 = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM notifications WHERE rfq_id = ?1)",
                )
                .bind(&id)
                .fetch_one(pool)
                .await?;
                checks.push(("closing notification", notified == 1));
            }
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

fn find_user<'a>(users: &'a [User], username: &str) -> Result<&'a User, RepositoryError> {
    users.iter().find(|user| user.username == username).ok_or_else(|| {
        RepositoryError::Rejected(DomainError::NotFound(format!("seed user `{username}`")))
    })
}

fn seed_date((year, month, day): (i32, u32, u32)) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| RepositoryError::Decode(format!("invalid seed date {year}-{month}-{day}")))
}

#[derive(Debug)]
pub struct SeedResult {
    pub already_seeded: bool,
    pub users_created: usize,
    pub rfqs_created: usize,
    pub quotations_created: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::{DemoDataset, SEED_RFQS, SEED_USERS};
    use crate::repositories::test_support::setup;

    #[tokio::test]
    async fn demo_dataset_loads_once_and_verifies() {
        let pool = setup().await;

        let first = DemoDataset::load(&pool).await.expect("load");
        assert!(!first.already_seeded);
        assert_eq!(first.users_created, SEED_USERS.len());
        assert_eq!(first.rfqs_created, SEED_RFQS.len());
        assert_eq!(first.quotations_created, 5);

        let verification = DemoDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "{:?}", verification.checks);

        let second = DemoDataset::load(&pool).await.expect("reload");
        assert!(second.already_seeded);
        let rfq_count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM rfqs").fetch_one(&pool).await.expect("count");
        assert_eq!(rfq_count, SEED_RFQS.len() as i64);
    }

    #[tokio::test]
    async fn verify_reports_missing_dataset() {
        let pool = setup().await;
        let verification = DemoDataset::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
    }

    #[test]
    fn every_seed_rfq_references_known_users() {
        for rfq in SEED_RFQS {
            assert!(SEED_USERS.iter().any(|user| user.username == rfq.sales));
            if let Some(engineer) = rfq.engineer {
                assert!(SEED_USERS.iter().any(|user| user.username == engineer));
            }
        }
    }
}
