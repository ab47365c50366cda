use tracing::info;

use moyu_db::{CampaignFields, Database};
use moyu_types::api::{CampaignDetail, CampaignRequest, CampaignSummary};
use moyu_types::models::{Campaign, CampaignImage, User};

use super::ownership::OwnershipCheck;
use super::{ServiceError, ServiceResult};

/// Lowercase ASCII words joined by single hyphens.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn fields(req: &CampaignRequest) -> CampaignFields<'_> {
    CampaignFields {
        name: req.name.trim(),
        short_description: req.short_description.trim(),
        description: req.description.trim(),
        perks: req.perks.trim(),
        goal_amount: req.goal_amount,
    }
}

/// All campaigns, or only those owned by `owner_id` when it is positive.
pub fn list(db: &Database, owner_id: Option<i64>) -> ServiceResult<Vec<CampaignSummary>> {
    let owner_id = owner_id.filter(|id| *id > 0);
    let rows = db.list_campaigns(owner_id)?;
    Ok(rows
        .iter()
        .map(|(campaign, image)| CampaignSummary::new(campaign, image.as_deref()))
        .collect())
}

pub fn detail(db: &Database, id: i64) -> ServiceResult<CampaignDetail> {
    let campaign = db.get_campaign(id)?.ok_or(ServiceError::NotFound("campaign"))?;
    let owner = db
        .get_user_by_id(campaign.user_id)?
        .ok_or(ServiceError::NotFound("campaign owner"))?;
    let images = db.get_campaign_images(id)?;
    Ok(CampaignDetail::new(&campaign, &owner, &images))
}

pub fn create(db: &Database, req: &CampaignRequest, actor: &User) -> ServiceResult<Campaign> {
    req.validate().map_err(ServiceError::Validation)?;

    let slug = slugify(&format!("{} {}", req.name, actor.id));
    let campaign = db.create_campaign(actor.id, &fields(req), &slug)?;
    info!("User {} created campaign {} ({})", actor.id, campaign.id, campaign.slug);
    Ok(campaign)
}

/// The campaign, provided `actor` owns it.
pub fn owned_by(db: &Database, id: i64, actor: &User) -> ServiceResult<Campaign> {
    db.get_campaign(id)?.owned_by(actor, "campaign")
}

pub fn update(db: &Database, id: i64, req: &CampaignRequest, actor: &User) -> ServiceResult<Campaign> {
    owned_by(db, id, actor)?;
    req.validate().map_err(ServiceError::Validation)?;

    db.update_campaign(id, &fields(req))?
        .ok_or(ServiceError::NotFound("campaign"))
}

/// Record an uploaded image. A primary image replaces any previous primary
/// of the same campaign atomically.
pub fn save_image(
    db: &Database,
    campaign_id: i64,
    is_primary: bool,
    actor: &User,
    file_name: &str,
) -> ServiceResult<CampaignImage> {
    owned_by(db, campaign_id, actor)?;
    let image = db.add_campaign_image(campaign_id, file_name, is_primary)?;
    info!(
        "Campaign {} image {} saved (primary: {})",
        campaign_id, image.id, image.is_primary
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use moyu_db::NewUser;

    fn user(db: &Database, email: &str) -> User {
        db.create_user(&NewUser {
            name: "Owner",
            occupation: "Farmer",
            email,
            password_hash: "x",
        })
        .unwrap()
    }

    fn request(name: &str) -> CampaignRequest {
        CampaignRequest {
            name: name.into(),
            short_description: "Seeds".into(),
            description: "Seeds for the next season".into(),
            goal_amount: 500_000,
            perks: "thanks card, sack of rice,  ".into(),
        }
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("Rice Field 2024 7"), "rice-field-2024-7");
        assert_eq!(slugify("  Hello,   World!! 3 "), "hello-world-3");
        assert_eq!(slugify("Kopi & Teh"), "kopi-teh");
    }

    #[test]
    fn create_sets_owner_slug_and_zero_counters() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner@example.com");

        let campaign = create(&db, &request("Rice Field"), &owner).unwrap();
        assert_eq!(campaign.user_id, owner.id);
        assert_eq!(campaign.slug, format!("rice-field-{}", owner.id));
        assert_eq!(campaign.backer_count, 0);
        assert_eq!(campaign.current_amount, 0);
        assert_eq!(campaign.perk_list(), vec!["thanks card", "sack of rice"]);
    }

    #[test]
    fn only_owner_can_update() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner@example.com");
        let other = user(&db, "other@example.com");
        let campaign = create(&db, &request("Rice Field"), &owner).unwrap();

        let denied = update(&db, campaign.id, &request("Hijacked"), &other);
        assert!(matches!(denied, Err(ServiceError::Forbidden(_))));
        assert_eq!(db.get_campaign(campaign.id).unwrap().unwrap().name, "Rice Field");

        let updated = update(&db, campaign.id, &request("Rice Terrace"), &owner).unwrap();
        assert_eq!(updated.name, "Rice Terrace");
        assert_eq!(updated.slug, campaign.slug);

        assert!(matches!(
            update(&db, 404, &request("Ghost"), &owner),
            Err(ServiceError::NotFound("campaign"))
        ));
    }

    #[test]
    fn only_owner_can_add_images() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner@example.com");
        let other = user(&db, "other@example.com");
        let campaign = create(&db, &request("Rice Field"), &owner).unwrap();

        assert!(matches!(
            save_image(&db, campaign.id, true, &other, "x.png"),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(db.get_campaign_images(campaign.id).unwrap().is_empty());

        save_image(&db, campaign.id, true, &owner, "a.png").unwrap();
        save_image(&db, campaign.id, true, &owner, "b.png").unwrap();
        let detail = detail(&db, campaign.id).unwrap();
        assert_eq!(detail.image_url, "b.png");
        assert_eq!(detail.images.iter().filter(|i| i.is_primary).count(), 1);
    }

    #[test]
    fn list_ignores_non_positive_owner_filter() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a@example.com");
        let b = user(&db, "b@example.com");
        create(&db, &request("One"), &a).unwrap();
        create(&db, &request("Two"), &b).unwrap();

        assert_eq!(list(&db, None).unwrap().len(), 2);
        assert_eq!(list(&db, Some(0)).unwrap().len(), 2);
        assert_eq!(list(&db, Some(b.id)).unwrap().len(), 1);
    }
}
