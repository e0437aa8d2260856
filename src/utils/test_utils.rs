//! Test utilities for ledger testing.

#[cfg(test)]
pub mod utils {
    use crate::core::payload::{
        Amount, AwardDeclaration, CitizenQuery, CompensationPayment, Litigation, Payload,
    };
    use crate::core::transaction::Transaction;

    /// Award over a single survey number in Wagholi, Haveli tehsil.
    pub fn award(survey: &str) -> Payload {
        Payload::AwardDeclaration(AwardDeclaration {
            project_name: "Ring Road".into(),
            survey_numbers: vec![survey.to_string()],
            village: "Wagholi".into(),
            tehsil: "Haveli".into(),
            district: "Pune".into(),
            compensation_rate: Amount::from_rupees(4_500),
            officer_id: "LAO-7".into(),
        })
    }

    pub fn payment(survey: &str) -> Payload {
        Payload::CompensationPayment(CompensationPayment {
            survey_number: survey.to_string(),
            property_number: "P-12".into(),
            beneficiary_name: "A. Patil".into(),
            beneficiary_account: "000123456789".into(),
            amount: Amount::from_paise(1_250_050),
            payment_method: "NEFT".into(),
            officer_id: "LAO-7".into(),
        })
    }

    pub fn citizen_query(survey: &str) -> Payload {
        Payload::CitizenQuery(CitizenQuery {
            survey_number: survey.to_string(),
            query_type: "Objection".into(),
            complainant_name: "R. Jadhav".into(),
            query_details: "Boundary marked incorrectly".into(),
            officer_id: "LAO-7".into(),
        })
    }

    pub fn litigation(survey: &str) -> Payload {
        Payload::Litigation(Litigation {
            survey_number: survey.to_string(),
            case_number: "WP-1024/2024".into(),
            court_name: "Bombay High Court".into(),
            case_details: "Challenge to award".into(),
            officer_id: "LAO-7".into(),
        })
    }

    /// Builds a transaction with a pinned timestamp.
    pub fn tx_at(payload: Payload, timestamp: u64) -> Transaction {
        Transaction::builder(payload)
            .timestamp(timestamp)
            .build()
            .expect("test payload is valid")
    }
}
