//! Core types used throughout the router
//!
//! Account identifiers, locality tags and the legacy transaction codes shared
//! by every backend.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Amount in the smallest currency unit.
///
/// Non-negative by construction; zero is a valid no-op amount.
pub type Amount = u64;

/// Signed balance as reported by a backend.
///
/// The legacy money server may report negative balances for system accounts,
/// so balances are kept signed even though transfer amounts are not.
pub type Balance = i64;

/// Region handle (packed grid coordinates) carried as correlation metadata.
pub type RegionHandle = u64;

/// Opaque account identifier.
///
/// The nil UUID is reserved as the **system** identity: it is never resolved
/// against a backend and, as a sender, skips the balance-sufficiency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    /// The system sentinel (nil UUID)
    pub const SYSTEM: AccountId = AccountId(Uuid::nil());

    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a fresh random account id
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    #[inline]
    pub fn is_system(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for AccountId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// Where an account lives, resolved fresh for every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locality {
    /// Known to the local ledger
    Local,
    /// Definitively absent from the local ledger
    Remote,
    /// Lookup failed or was ambiguous; routed as `Remote`
    Unknown,
}

impl Locality {
    /// Routing view: `Unknown` fails toward the legacy path.
    #[inline]
    pub fn is_local(&self) -> bool {
        matches!(self, Locality::Local)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Locality::Local => "LOCAL",
            Locality::Remote => "REMOTE",
            Locality::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Locality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Legacy money-server transaction codes.
///
/// Codes are part of the wire protocol and must never be renumbered.
/// Codes this crate does not know are carried through as [`TransactionKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransactionKind {
    #[default]
    None,
    // Extend
    BirthGift,
    AwardPoints,
    // One-time charges
    ObjectClaim,
    LandClaim,
    GroupCreate,
    GroupJoin,
    TeleportCharge,
    UploadCharge,
    LandAuction,
    ClassifiedCharge,
    // Recurrent charges
    ObjectTax,
    LandTax,
    LightTax,
    ParcelDirFee,
    GroupTax,
    ClassifiedRenew,
    ScheduledFee,
    // Inventory
    GiveInventory,
    // Transfers between users
    ObjectSale,
    Gift,
    LandSale,
    ReferBonus,
    InventorySale,
    RefundPurchase,
    LandPassSale,
    DwellBonus,
    PayObject,
    ObjectPays,
    BuyMoney,
    MoveMoney,
    SendMoney,
    // Group transactions
    GroupLandDeed,
    GroupObjectDeed,
    GroupLiability,
    GroupDividend,
    GroupMembershipDues,
    // Stipend credits
    StipendBasic,
    Other(i32),
}

impl TransactionKind {
    /// Numeric code sent as `transactionType`
    pub fn code(&self) -> i32 {
        match self {
            TransactionKind::None => 0,
            TransactionKind::BirthGift => 900,
            TransactionKind::AwardPoints => 901,
            TransactionKind::ObjectClaim => 1000,
            TransactionKind::LandClaim => 1001,
            TransactionKind::GroupCreate => 1002,
            TransactionKind::GroupJoin => 1004,
            TransactionKind::TeleportCharge => 1100,
            TransactionKind::UploadCharge => 1101,
            TransactionKind::LandAuction => 1102,
            TransactionKind::ClassifiedCharge => 1103,
            TransactionKind::ObjectTax => 2000,
            TransactionKind::LandTax => 2001,
            TransactionKind::LightTax => 2002,
            TransactionKind::ParcelDirFee => 2003,
            TransactionKind::GroupTax => 2004,
            TransactionKind::ClassifiedRenew => 2005,
            TransactionKind::ScheduledFee => 2900,
            TransactionKind::GiveInventory => 3000,
            TransactionKind::ObjectSale => 5000,
            TransactionKind::Gift => 5001,
            TransactionKind::LandSale => 5002,
            TransactionKind::ReferBonus => 5003,
            TransactionKind::InventorySale => 5004,
            TransactionKind::RefundPurchase => 5005,
            TransactionKind::LandPassSale => 5006,
            TransactionKind::DwellBonus => 5007,
            TransactionKind::PayObject => 5008,
            TransactionKind::ObjectPays => 5009,
            TransactionKind::BuyMoney => 5010,
            TransactionKind::MoveMoney => 5011,
            TransactionKind::SendMoney => 5012,
            TransactionKind::GroupLandDeed => 6001,
            TransactionKind::GroupObjectDeed => 6002,
            TransactionKind::GroupLiability => 6003,
            TransactionKind::GroupDividend => 6004,
            TransactionKind::GroupMembershipDues => 6005,
            TransactionKind::StipendBasic => 10000,
            TransactionKind::Other(code) => *code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => TransactionKind::None,
            900 => TransactionKind::BirthGift,
            901 => TransactionKind::AwardPoints,
            1000 => TransactionKind::ObjectClaim,
            1001 => TransactionKind::LandClaim,
            1002 => TransactionKind::GroupCreate,
            1004 => TransactionKind::GroupJoin,
            1100 => TransactionKind::TeleportCharge,
            1101 => TransactionKind::UploadCharge,
            1102 => TransactionKind::LandAuction,
            1103 => TransactionKind::ClassifiedCharge,
            2000 => TransactionKind::ObjectTax,
            2001 => TransactionKind::LandTax,
            2002 => TransactionKind::LightTax,
            2003 => TransactionKind::ParcelDirFee,
            2004 => TransactionKind::GroupTax,
            2005 => TransactionKind::ClassifiedRenew,
            2900 => TransactionKind::ScheduledFee,
            3000 => TransactionKind::GiveInventory,
            5000 => TransactionKind::ObjectSale,
            5001 => TransactionKind::Gift,
            5002 => TransactionKind::LandSale,
            5003 => TransactionKind::ReferBonus,
            5004 => TransactionKind::InventorySale,
            5005 => TransactionKind::RefundPurchase,
            5006 => TransactionKind::LandPassSale,
            5007 => TransactionKind::DwellBonus,
            5008 => TransactionKind::PayObject,
            5009 => TransactionKind::ObjectPays,
            5010 => TransactionKind::BuyMoney,
            5011 => TransactionKind::MoveMoney,
            5012 => TransactionKind::SendMoney,
            6001 => TransactionKind::GroupLandDeed,
            6002 => TransactionKind::GroupObjectDeed,
            6003 => TransactionKind::GroupLiability,
            6004 => TransactionKind::GroupDividend,
            6005 => TransactionKind::GroupMembershipDues,
            10000 => TransactionKind::StipendBasic,
            other => TransactionKind::Other(other),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Other(code) => write!(f, "Other({})", code),
            kind => write!(f, "{:?}({})", kind, kind.code()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_sentinel() {
        assert!(AccountId::SYSTEM.is_system());
        assert!(!AccountId::random().is_system());
        assert_eq!(
            AccountId::SYSTEM.to_string(),
            "00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_account_id_parse() {
        let id: AccountId = " 6f1c7a52-8a3e-4c8e-9d43-2f2b8f9b6d10 ".parse().unwrap();
        assert_eq!(id.to_string(), "6f1c7a52-8a3e-4c8e-9d43-2f2b8f9b6d10");
        assert!("not-a-uuid".parse::<AccountId>().is_err());
    }

    #[test]
    fn test_unknown_routes_as_remote() {
        assert!(Locality::Local.is_local());
        assert!(!Locality::Remote.is_local());
        assert!(!Locality::Unknown.is_local());
    }

    #[test]
    fn test_transaction_kind_codes() {
        assert_eq!(TransactionKind::PayObject.code(), 5008);
        assert_eq!(TransactionKind::from_code(5011), TransactionKind::MoveMoney);
        assert_eq!(TransactionKind::from_code(10000), TransactionKind::StipendBasic);
        assert_eq!(TransactionKind::from_code(4242), TransactionKind::Other(4242));
        assert_eq!(TransactionKind::Other(4242).code(), 4242);
    }

    #[test]
    fn test_transaction_kind_display() {
        assert_eq!(TransactionKind::Gift.to_string(), "Gift(5001)");
        assert_eq!(TransactionKind::Other(7).to_string(), "Other(7)");
    }
}
