//! Built-in table of recognized nutrient column codes.
//!
//! The wire format carries one column per nutrient, headed by a short
//! uppercase code. The table is fixed at build time so column resolution
//! is typed instead of stringly; deployments narrow the recognized set
//! through `DatasetProfile::nutrient_codes`.

use serde::{Deserialize, Serialize};

macro_rules! nutrient_codes {
    ($($code:ident),+ $(,)?) => {
        /// One recognized nutrient column.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum NutrientCode {
            $($code,)+
        }

        impl NutrientCode {
            /// Every recognized code, in table order.
            pub const ALL: &'static [NutrientCode] = &[$(NutrientCode::$code,)+];

            /// Wire label of this code.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(NutrientCode::$code => stringify!($code),)+
                }
            }
        }
    };
}

nutrient_codes! {
    // Energy and gross composition
    GCAL, GJ, GCALZB, GJZB, GFPS, GKB, GMKO, GP,
    ZW, ZE, ZF, ZK, ZB, ZM, ZO, ZA,
    // Vitamins
    VA, VAR, VAC, VD, VE, VEAT, VK, VB1, VB2, VB3, VB3A, VB5, VB6, VB7,
    VB9G, VB12, VC,
    // Minerals and trace elements
    MNA, MK, MCA, MMG, MP, MS, MCL, MFE, MZN, MCU, MMN, MF, MJ,
    // Carbohydrate and fibre detail
    KAM, KAS, KAX, KA, KMT, KMF, KMG, KM, KDS, KDM, KDL, KD, KMD,
    KPOR, KPON, KPG, KPS, KP, KBP, KBH, KBU, KBC, KBL, KBW, KBN,
    // Amino acids
    EILE, ELEU, ELYS, EMET, ECYS, EPHE, ETYR, ETHR, ETRP, EVAL, EARG,
    EHIS, EEA, EALA, EASP, EGLU, EGLY, EPRO, ESER, ENA, EH, EP,
    // Fatty acids
    F40, F60, F80, F100, F120, F140, F150, F160, F170, F180, F200,
    F220, F240, FS, F141, F151, F161, F171, F181, F201, F221, F241,
    FU, F162, F164, F182, F183, F184, F193, F202, F203, F204, F205,
    F222, F223, F224, F225, F226, FP, FK, FM, FL, FO3, FO6, FG, FC,
}

impl NutrientCode {
    /// Look up a header label, tolerating case and stray whitespace.
    pub fn from_label(label: &str) -> Option<NutrientCode> {
        let label = label.trim();
        NutrientCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str().eq_ignore_ascii_case(label))
    }
}

impl std::fmt::Display for NutrientCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
