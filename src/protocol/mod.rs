//! The four protocol actors and their interactions.
//!
//! * The [`TrustedAuthority`] issues attribute keys, signed pseudonym
//!   certificates, and the pseudonymization key.
//! * The [`DataOwner`] indexes keywords as trapdoors, encrypts records under
//!   access policies, and hands the server a serialized index snapshot.
//! * The [`DataUser`] unwraps the trapdoor key through the attribute-based
//!   channel, derives query trapdoors (wildcards included), and decrypts
//!   authorized records.
//! * The [`CloudServer`] verifies certificates, resolves queries over the
//!   index, and enforces pseudo-policies, all without ever seeing a
//!   keyword, an attribute name, or a plaintext.
//!
//! The protocol is synchronous request/response; the server
//! additionally supports concurrent query batches against a shared index
//! (see [`CloudServer`]).
mod authority;
mod owner;
mod server;
mod user;

pub use self::authority::TrustedAuthority;
pub use self::owner::DataOwner;
pub use self::server::{CloudServer, ServerConfig};
pub use self::user::DataUser;

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    use super::*;
    use crate::{
        abe::testing::ClearAbe,
        bloom::BloomParams,
        envelope,
        error::Error,
        iwt::SearchBudget,
        record,
    };

    fn attributes(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_owned()).collect()
    }

    struct Deployment {
        authority: TrustedAuthority<ClearAbe>,
        owner: DataOwner<ClearAbe>,
        server: CloudServer,
    }

    /// Owner indexes two keywords for "f1" under "(doctor or researcher)"
    /// and one for "f2" under "(researcher and biomedical)".
    fn deploy(rng: &mut ChaChaRng) -> Deployment {
        let authority = TrustedAuthority::new(ClearAbe, &mut *rng);
        let mut owner = DataOwner::new(
            ClearAbe,
            authority.master_public().clone(),
            authority.pseudo_key().clone(),
            BloomParams::default(),
            &mut *rng,
        );

        let f1 = owner
            .encrypt_record(&mut *rng, b"ehr one", "(doctor or researcher)")
            .unwrap();
        let f2 = owner
            .encrypt_record(&mut *rng, b"ehr two", "(researcher and biomedical)")
            .unwrap();
        for keyword in ["diabetes", "hypertension", "chronic_conditions"] {
            owner.index_keyword(keyword, "f1").unwrap();
        }
        for keyword in ["diabetes", "coronary_artery_disease"] {
            owner.index_keyword(keyword, "f2").unwrap();
        }

        let records = BTreeMap::from([("f1".to_owned(), f1), ("f2".to_owned(), f2)]);
        let server = CloudServer::new(
            &mut *rng,
            &owner.export_index().unwrap(),
            records,
            authority.verifying_key(),
            ServerConfig::default(),
        )
        .unwrap();
        Deployment { authority, owner, server }
    }

    fn enrolled_user(
        deployment: &Deployment,
        rng: &mut ChaChaRng,
        attrs: &[&str],
    ) -> (DataUser<ClearAbe>, crate::cert::AttributeCertificate) {
        let attrs = attributes(attrs);
        let user_key = deployment.authority.user_key(&mut *rng, &attrs);
        let certificate = deployment.authority.issue_certificate(&attrs).unwrap();
        let mut user = DataUser::new(
            ClearAbe,
            deployment.authority.master_public().clone(),
            user_key,
        );
        let wrapped = deployment
            .owner
            .wrap_trapdoor_key(&mut *rng, "(global)")
            .unwrap();
        user.unwrap_trapdoor_key(&wrapped).unwrap();
        (user, certificate)
    }

    #[test]
    fn doctor_gets_the_file_nurse_gets_nothing() {
        let mut rng = ChaChaRng::from_seed([50; 32]);
        let deployment = deploy(&mut rng);

        let (doctor, doctor_cert) =
            enrolled_user(&deployment, &mut rng, &["DOCTOR", "global"]);
        let queries = doctor.query(&["dia*"]).unwrap();
        let found = deployment.server.process_batch(&queries, &doctor_cert).unwrap();
        // "dia*" matches "diabetes" in both files, but only f1's policy
        // admits a doctor.
        assert_eq!(found.len(), 1);
        assert!(found.contains("f1"));

        let (nurse, nurse_cert) = enrolled_user(&deployment, &mut rng, &["NURSE", "global"]);
        let queries = nurse.query(&["dia*"]).unwrap();
        let found = deployment.server.process_batch(&queries, &nurse_cert).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn authorized_user_decrypts_the_returned_record() {
        let mut rng = ChaChaRng::from_seed([51; 32]);
        let deployment = deploy(&mut rng);
        let (doctor, certificate) =
            enrolled_user(&deployment, &mut rng, &["DOCTOR", "global"]);

        let queries = doctor.query(&["hypert*"]).unwrap();
        let found = deployment.server.process_batch(&queries, &certificate).unwrap();
        assert!(found.contains("f1"));
        let bytes = deployment.server.fetch_record("f1").unwrap();
        assert_eq!(doctor.decrypt_record(&bytes).unwrap(), b"ehr one");
    }

    #[test]
    fn unauthorized_decryption_is_a_key_unwrap_failure() {
        let mut rng = ChaChaRng::from_seed([52; 32]);
        let deployment = deploy(&mut rng);
        let (nurse, _) = enrolled_user(&deployment, &mut rng, &["NURSE", "global"]);
        let bytes = deployment.server.fetch_record("f1").unwrap();
        assert!(matches!(
            nurse.decrypt_record(&bytes),
            Err(Error::KeyUnwrapFailure)
        ));
    }

    #[test]
    fn tampered_record_fails_the_integrity_check() {
        let mut rng = ChaChaRng::from_seed([53; 32]);
        let deployment = deploy(&mut rng);
        let (doctor, _) = enrolled_user(&deployment, &mut rng, &["DOCTOR", "global"]);
        let bytes = deployment.server.fetch_record("f1").unwrap();
        let mut tampered: record::FileRecord = record::decode(&bytes).unwrap();
        // Flip a ciphertext byte inside the key bundle; the tag was computed
        // over these bytes.
        let mut bundle: record::KeyBundle = record::decode(&tampered.ctk).unwrap();
        let last = bundle.ciphertext.len() - 1;
        bundle.ciphertext[last] ^= 0x01;
        tampered.ctk = record::encode(&bundle).unwrap();
        let tampered_bytes = record::encode(&tampered).unwrap();
        assert!(matches!(
            doctor.decrypt_record(&tampered_bytes),
            Err(Error::PaddingOrMacFailure)
        ));
    }

    #[test]
    fn queries_in_one_batch_intersect() {
        let mut rng = ChaChaRng::from_seed([54; 32]);
        let deployment = deploy(&mut rng);
        let (researcher, certificate) =
            enrolled_user(&deployment, &mut rng, &["RESEARCHER", "BIOMEDICAL", "global"]);

        // "dia*" alone matches f1 and f2; adding "coronary*" narrows the
        // batch to f2.
        let queries = researcher.query(&["dia*", "coronary*"]).unwrap();
        let found = deployment.server.process_batch(&queries, &certificate).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains("f2"));
    }

    #[test]
    fn forged_certificate_aborts_the_batch() {
        let mut rng = ChaChaRng::from_seed([55; 32]);
        let deployment = deploy(&mut rng);
        let (doctor, certificate) =
            enrolled_user(&deployment, &mut rng, &["DOCTOR", "global"]);
        let mut forged = certificate;
        forged.signature[7] ^= 0x01;
        let queries = doctor.query(&["dia*"]).unwrap();
        assert!(matches!(
            deployment.server.process_batch(&queries, &forged),
            Err(Error::CertificateInvalid)
        ));
    }

    #[test]
    fn user_without_global_attribute_cannot_unwrap_the_trapdoor_key() {
        let mut rng = ChaChaRng::from_seed([56; 32]);
        let deployment = deploy(&mut rng);
        let attrs = attributes(&["DOCTOR"]);
        let user_key = deployment.authority.user_key(&mut rng, &attrs);
        let mut user = DataUser::new(
            ClearAbe,
            deployment.authority.master_public().clone(),
            user_key,
        );
        let wrapped = deployment.owner.wrap_trapdoor_key(&mut rng, "(global)").unwrap();
        assert!(matches!(
            user.unwrap_trapdoor_key(&wrapped),
            Err(Error::KeyUnwrapFailure)
        ));
        assert!(matches!(user.query(&["dia*"]), Err(Error::TrapdoorKeyMissing)));
    }

    #[test]
    fn exhausted_budget_fails_the_batch_loudly() {
        let mut rng = ChaChaRng::from_seed([57; 32]);
        let deployment = deploy(&mut rng);
        let (doctor, certificate) =
            enrolled_user(&deployment, &mut rng, &["DOCTOR", "global"]);

        let tight = CloudServer::new(
            &mut rng,
            &deployment.owner.export_index().unwrap(),
            BTreeMap::new(),
            deployment.authority.verifying_key(),
            ServerConfig {
                budget: SearchBudget { max_steps: 2, time_limit: None },
            },
        )
        .unwrap();
        let queries = doctor.query(&["*i*e*"]).unwrap();
        assert!(matches!(
            tight.process_batch(&queries, &certificate),
            Err(Error::SearchBudgetExceeded)
        ));
    }

    #[test]
    fn certificates_travel_sealed() {
        let mut rng = ChaChaRng::from_seed([58; 32]);
        let deployment = deploy(&mut rng);
        let (doctor, certificate) =
            enrolled_user(&deployment, &mut rng, &["DOCTOR", "global"]);

        let sealed = envelope::seal(
            &mut rng,
            &deployment.server.transport_key(),
            &record::encode(&certificate).unwrap(),
        );
        let received = deployment.server.accept_sealed_certificate(&sealed).unwrap();
        let queries = doctor.query(&["dia*"]).unwrap();
        let found = deployment.server.process_batch(&queries, &received).unwrap();
        assert!(found.contains("f1"));
    }

    #[test]
    fn malformed_stored_policy_denies_only_that_file() {
        let mut rng = ChaChaRng::from_seed([59; 32]);
        let deployment = deploy(&mut rng);
        // A researcher with "biomedical" satisfies both files' policies, so
        // corrupting f2's stored pseudo-policy is the only thing denying it.
        let (researcher, certificate) =
            enrolled_user(&deployment, &mut rng, &["RESEARCHER", "BIOMEDICAL", "global"]);

        let bytes = deployment.server.fetch_record("f2").unwrap();
        let mut broken: record::FileRecord = record::decode(&bytes).unwrap();
        broken.pseudo_policy = "((".to_owned();
        deployment
            .server
            .store_record("f2", record::encode(&broken).unwrap());

        let queries = researcher.query(&["dia*"]).unwrap();
        let found = deployment.server.process_batch(&queries, &certificate).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains("f1"));
    }
}
