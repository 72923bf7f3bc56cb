use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

fn created_at<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ========================================
        // REALMS
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(Realms::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Realms::Name)
                            .string_len(255)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Realms::Domain)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Realms::Attributes).json().not_null())
                    .col(ColumnDef::new(Realms::Features).json().not_null())
                    .col(created_at(Realms::CreatedAt))
                    .col(created_at(Realms::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // ========================================
        // USERS (mirror)
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Realm).string_len(255).not_null())
                    .col(ColumnDef::new(Users::Email).string_len(320).not_null())
                    .col(ColumnDef::new(Users::FirstName).string_len(255).null())
                    .col(ColumnDef::new(Users::LastName).string_len(255).null())
                    .col(
                        ColumnDef::new(Users::IsOrgManager)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(created_at(Users::CreatedAt))
                    .col(created_at(Users::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_users_realm")
                            .from(Users::Table, Users::Realm)
                            .to(Realms::Table, Realms::Name)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_realm_email")
                    .table(Users::Table)
                    .col(Users::Realm)
                    .col(Users::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ========================================
        // GROUPS (mirror)
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(Groups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Groups::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Groups::Realm).string_len(255).not_null())
                    .col(ColumnDef::new(Groups::Name).string_len(255).not_null())
                    .col(created_at(Groups::CreatedAt))
                    .col(created_at(Groups::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_groups_realm")
                            .from(Groups::Table, Groups::Realm)
                            .to(Realms::Table, Realms::Name)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ========================================
        // TEMPLATES
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(Templates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Templates::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Templates::Realm).string_len(255).null())
                    .col(ColumnDef::new(Templates::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Templates::Kind).string_len(32).not_null())
                    .col(ColumnDef::new(Templates::Subject).string_len(998).null())
                    .col(ColumnDef::new(Templates::Body).text().not_null())
                    .col(created_at(Templates::CreatedAt))
                    .col(created_at(Templates::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_templates_realm")
                            .from(Templates::Table, Templates::Realm)
                            .to(Realms::Table, Realms::Name)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ========================================
        // SENDING PROFILES
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(SendingProfiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SendingProfiles::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SendingProfiles::Realm)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SendingProfiles::Name)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SendingProfiles::Host)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SendingProfiles::Port).integer().not_null())
                    .col(
                        ColumnDef::new(SendingProfiles::Username)
                            .string_len(255)
                            .null(),
                    )
                    .col(ColumnDef::new(SendingProfiles::Password).text().null())
                    .col(
                        ColumnDef::new(SendingProfiles::FromAddress)
                            .string_len(320)
                            .not_null(),
                    )
                    .col(created_at(SendingProfiles::CreatedAt))
                    .col(created_at(SendingProfiles::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sending_profiles_realm")
                            .from(SendingProfiles::Table, SendingProfiles::Realm)
                            .to(Realms::Table, Realms::Name)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ========================================
        // PHISHING KITS
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(PhishingKits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PhishingKits::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PhishingKits::Realm).string_len(255).not_null())
                    .col(ColumnDef::new(PhishingKits::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(PhishingKits::EmailTemplateId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PhishingKits::LandingPageTemplateId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PhishingKits::SendingProfileId)
                            .integer()
                            .null(),
                    )
                    .col(ColumnDef::new(PhishingKits::Args).json().not_null())
                    .col(created_at(PhishingKits::CreatedAt))
                    .col(created_at(PhishingKits::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_phishing_kits_realm")
                            .from(PhishingKits::Table, PhishingKits::Realm)
                            .to(Realms::Table, Realms::Name)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_phishing_kits_email_template")
                            .from(PhishingKits::Table, PhishingKits::EmailTemplateId)
                            .to(Templates::Table, Templates::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_phishing_kits_landing_template")
                            .from(PhishingKits::Table, PhishingKits::LandingPageTemplateId)
                            .to(Templates::Table, Templates::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_phishing_kits_sending_profile")
                            .from(PhishingKits::Table, PhishingKits::SendingProfileId)
                            .to(SendingProfiles::Table, SendingProfiles::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // ========================================
        // CAMPAIGNS
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(Campaigns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Campaigns::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Campaigns::Realm).string_len(255).not_null())
                    .col(ColumnDef::new(Campaigns::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Campaigns::BeginDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Campaigns::EndDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Campaigns::SendIntervalSeconds)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Campaigns::Status)
                            .string_len(32)
                            .not_null()
                            .default("SCHEDULED"),
                    )
                    .col(ColumnDef::new(Campaigns::TotalRecipients).integer().null())
                    .col(
                        ColumnDef::new(Campaigns::TotalSent)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Campaigns::TotalOpened)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Campaigns::TotalClicked)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Campaigns::TotalPhished)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(created_at(Campaigns::CreatedAt))
                    .col(created_at(Campaigns::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_campaigns_realm")
                            .from(Campaigns::Table, Campaigns::Realm)
                            .to(Realms::Table, Realms::Name)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_campaigns_status_begin")
                    .table(Campaigns::Table)
                    .col(Campaigns::Status)
                    .col(Campaigns::BeginDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CampaignGroups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CampaignGroups::CampaignId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampaignGroups::GroupId)
                            .string_len(64)
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(CampaignGroups::CampaignId)
                            .col(CampaignGroups::GroupId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_campaign_groups_campaign")
                            .from(CampaignGroups::Table, CampaignGroups::CampaignId)
                            .to(Campaigns::Table, Campaigns::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CampaignKits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CampaignKits::CampaignId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampaignKits::PhishingKitId)
                            .integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(CampaignKits::CampaignId)
                            .col(CampaignKits::PhishingKitId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_campaign_kits_campaign")
                            .from(CampaignKits::Table, CampaignKits::CampaignId)
                            .to(Campaigns::Table, Campaigns::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_campaign_kits_kit")
                            .from(CampaignKits::Table, CampaignKits::PhishingKitId)
                            .to(PhishingKits::Table, PhishingKits::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ========================================
        // EMAIL SENDINGS
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(EmailSendings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailSendings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EmailSendings::CampaignId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailSendings::UserId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailSendings::EmailTo)
                            .string_len(320)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmailSendings::FirstName).string_len(255).null())
                    .col(ColumnDef::new(EmailSendings::LastName).string_len(255).null())
                    .col(
                        ColumnDef::new(EmailSendings::PhishingKitId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailSendings::ScheduledDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailSendings::TrackingToken)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(EmailSendings::Status)
                            .string_len(32)
                            .not_null()
                            .default("SCHEDULED"),
                    )
                    .col(
                        ColumnDef::new(EmailSendings::SentAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EmailSendings::DeliveredAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EmailSendings::OpenedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EmailSendings::ClickedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EmailSendings::PhishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(created_at(EmailSendings::CreatedAt))
                    .col(created_at(EmailSendings::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_sendings_campaign")
                            .from(EmailSendings::Table, EmailSendings::CampaignId)
                            .to(Campaigns::Table, Campaigns::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_sendings_kit")
                            .from(EmailSendings::Table, EmailSendings::PhishingKitId)
                            .to(PhishingKits::Table, PhishingKits::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_sendings_status_scheduled")
                    .table(EmailSendings::Table)
                    .col(EmailSendings::Status)
                    .col(EmailSendings::ScheduledDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_sendings_campaign")
                    .table(EmailSendings::Table)
                    .col(EmailSendings::CampaignId)
                    .to_owned(),
            )
            .await?;

        // ========================================
        // COMPLIANCE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(CompliancePolicies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CompliancePolicies::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CompliancePolicies::Tenant)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CompliancePolicies::Version)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CompliancePolicies::Title)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(CompliancePolicies::Content).text().not_null())
                    .col(
                        ColumnDef::new(CompliancePolicies::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(created_at(CompliancePolicies::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_compliance_policies_tenant_version")
                    .table(CompliancePolicies::Table)
                    .col(CompliancePolicies::Tenant)
                    .col(CompliancePolicies::Version)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ComplianceQuizzes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ComplianceQuizzes::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ComplianceQuizzes::Tenant)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ComplianceQuizzes::PolicyVersion)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ComplianceQuizzes::Questions).json().not_null())
                    .col(
                        ColumnDef::new(ComplianceQuizzes::PassingScore)
                            .integer()
                            .not_null(),
                    )
                    .col(created_at(ComplianceQuizzes::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ComplianceAcceptances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ComplianceAcceptances::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ComplianceAcceptances::UserIdentifier)
                            .string_len(320)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ComplianceAcceptances::Tenant)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ComplianceAcceptances::Version)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ComplianceAcceptances::Score)
                            .integer()
                            .not_null(),
                    )
                    .col(created_at(ComplianceAcceptances::AcceptedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_compliance_acceptances_unique")
                    .table(ComplianceAcceptances::Table)
                    .col(ComplianceAcceptances::UserIdentifier)
                    .col(ComplianceAcceptances::Tenant)
                    .col(ComplianceAcceptances::Version)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            ComplianceAcceptances::Table.into_iden(),
            ComplianceQuizzes::Table.into_iden(),
            CompliancePolicies::Table.into_iden(),
            EmailSendings::Table.into_iden(),
            CampaignKits::Table.into_iden(),
            CampaignGroups::Table.into_iden(),
            Campaigns::Table.into_iden(),
            PhishingKits::Table.into_iden(),
            SendingProfiles::Table.into_iden(),
            Templates::Table.into_iden(),
            Groups::Table.into_iden(),
            Users::Table.into_iden(),
            Realms::Table.into_iden(),
        ] {
            manager
                .drop_table(Table::drop().table(table).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Realms {
    Table,
    Name,
    Domain,
    Attributes,
    Features,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Realm,
    Email,
    FirstName,
    LastName,
    IsOrgManager,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Groups {
    Table,
    Id,
    Realm,
    Name,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Templates {
    Table,
    Id,
    Realm,
    Name,
    Kind,
    Subject,
    Body,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SendingProfiles {
    Table,
    Id,
    Realm,
    Name,
    Host,
    Port,
    Username,
    Password,
    FromAddress,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PhishingKits {
    Table,
    Id,
    Realm,
    Name,
    EmailTemplateId,
    LandingPageTemplateId,
    SendingProfileId,
    Args,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Campaigns {
    Table,
    Id,
    Realm,
    Name,
    BeginDate,
    EndDate,
    SendIntervalSeconds,
    Status,
    TotalRecipients,
    TotalSent,
    TotalOpened,
    TotalClicked,
    TotalPhished,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CampaignGroups {
    Table,
    CampaignId,
    GroupId,
}

#[derive(DeriveIden)]
enum CampaignKits {
    Table,
    CampaignId,
    PhishingKitId,
}

#[derive(DeriveIden)]
enum EmailSendings {
    Table,
    Id,
    CampaignId,
    UserId,
    EmailTo,
    FirstName,
    LastName,
    PhishingKitId,
    ScheduledDate,
    TrackingToken,
    Status,
    SentAt,
    DeliveredAt,
    OpenedAt,
    ClickedAt,
    PhishedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CompliancePolicies {
    Table,
    Id,
    Tenant,
    Version,
    Title,
    Content,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ComplianceQuizzes {
    Table,
    Id,
    Tenant,
    PolicyVersion,
    Questions,
    PassingScore,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ComplianceAcceptances {
    Table,
    Id,
    UserIdentifier,
    Tenant,
    Version,
    Score,
    AcceptedAt,
}
