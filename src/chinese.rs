use crate::language::Language;
use std::collections::HashMap;
use std::sync::OnceLock;

// (simplified, traditional)
const SCRIPT_PAIRS: &[(char, char)] = &[
    ('国', '國'), ('学', '學'), ('说', '說'), ('语', '語'), ('话', '話'), ('们', '們'),
    ('这', '這'), ('来', '來'), ('时', '時'), ('会', '會'), ('对', '對'), ('为', '為'),
    ('个', '個'), ('发', '發'), ('经', '經'), ('开', '開'), ('关', '關'), ('门', '門'),
    ('问', '問'), ('间', '間'), ('东', '東'), ('车', '車'), ('长', '長'), ('书', '書'),
    ('见', '見'), ('观', '觀'), ('现', '現'), ('电', '電'), ('马', '馬'), ('鸟', '鳥'),
    ('鱼', '魚'), ('龙', '龍'), ('爱', '愛'), ('欢', '歡'), ('听', '聽'), ('买', '買'),
    ('卖', '賣'), ('读', '讀'), ('写', '寫'), ('认', '認'), ('识', '識'), ('议', '議'),
    ('让', '讓'), ('请', '請'), ('谢', '謝'), ('诗', '詩'), ('词', '詞'), ('译', '譯'),
    ('汉', '漢'), ('简', '簡'), ('体', '體'), ('华', '華'), ('万', '萬'), ('与', '與'),
    ('后', '後'), ('过', '過'), ('还', '還'), ('进', '進'), ('远', '遠'), ('运', '運'),
    ('边', '邊'), ('达', '達'), ('选', '選'), ('钱', '錢'), ('银', '銀'), ('铁', '鐵'),
    ('钟', '鐘'), ('风', '風'), ('飞', '飛'), ('云', '雲'), ('气', '氣'), ('岁', '歲'),
    ('历', '歷'), ('业', '業'), ('乐', '樂'), ('习', '習'), ('乡', '鄉'), ('亲', '親'),
    ('儿', '兒'), ('动', '動'), ('劳', '勞'), ('区', '區'), ('医', '醫'), ('单', '單'),
    ('双', '雙'), ('变', '變'), ('号', '號'), ('员', '員'), ('图', '圖'), ('场', '場'),
    ('声', '聲'), ('处', '處'), ('备', '備'), ('头', '頭'), ('实', '實'), ('宝', '寶'),
    ('将', '將'), ('尔', '爾'), ('层', '層'), ('师', '師'), ('带', '帶'), ('应', '應'),
    ('张', '張'), ('当', '當'), ('怀', '懷'), ('总', '總'), ('恋', '戀'), ('战', '戰'),
    ('报', '報'), ('无', '無'), ('旧', '舊'), ('术', '術'), ('机', '機'), ('杂', '雜'),
    ('权', '權'), ('条', '條'), ('极', '極'), ('标', '標'), ('样', '樣'), ('树', '樹'),
    ('桥', '橋'), ('梦', '夢'), ('灯', '燈'), ('点', '點'), ('热', '熱'), ('爷', '爺'),
    ('状', '狀'), ('独', '獨'), ('环', '環'), ('产', '產'), ('画', '畫'), ('异', '異'),
    ('疗', '療'), ('众', '眾'), ('礼', '禮'), ('种', '種'), ('称', '稱'), ('穷', '窮'),
    ('笔', '筆'), ('红', '紅'), ('纪', '紀'), ('约', '約'), ('级', '級'), ('线', '線'),
    ('练', '練'), ('组', '組'), ('细', '細'), ('终', '終'), ('给', '給'), ('统', '統'),
    ('绝', '絕'), ('续', '續'), ('网', '網'), ('罗', '羅'), ('义', '義'), ('职', '職'),
    ('联', '聯'), ('脑', '腦'), ('节', '節'), ('艺', '藝'), ('苏', '蘇'), ('药', '藥'),
    ('虽', '雖'), ('视', '視'), ('觉', '覺'), ('计', '計'), ('记', '記'), ('讲', '講'),
    ('论', '論'), ('设', '設'), ('证', '證'), ('评', '評'), ('试', '試'), ('诚', '誠'),
    ('误', '誤'), ('调', '調'), ('谈', '談'), ('质', '質'), ('贵', '貴'), ('费', '費'),
    ('资', '資'), ('赶', '趕'), ('转', '轉'), ('轻', '輕'), ('辆', '輛'), ('适', '適'),
    ('递', '遞'), ('释', '釋'), ('钢', '鋼'), ('错', '錯'), ('闻', '聞'), ('阳', '陽'),
    ('阴', '陰'), ('际', '際'), ('陆', '陸'), ('难', '難'), ('须', '須'), ('顾', '顧'),
    ('题', '題'), ('饭', '飯'), ('馆', '館'), ('验', '驗'), ('鸡', '雞'), ('齐', '齊'),
    ('龟', '龜'), ('愿', '願'), ('满', '滿'), ('汤', '湯'), ('泪', '淚'), ('湾', '灣'),
];

fn to_traditional_map() -> &'static HashMap<char, char> {
    static MAP: OnceLock<HashMap<char, char>> = OnceLock::new();
    MAP.get_or_init(|| SCRIPT_PAIRS.iter().copied().collect())
}

fn to_simplified_map() -> &'static HashMap<char, char> {
    static MAP: OnceLock<HashMap<char, char>> = OnceLock::new();
    MAP.get_or_init(|| {
        SCRIPT_PAIRS
            .iter()
            .map(|(simplified, traditional)| (*traditional, *simplified))
            .collect()
    })
}

fn map_chars(text: &str, table: &HashMap<char, char>) -> String {
    text.chars()
        .map(|c| table.get(&c).copied().unwrap_or(c))
        .collect()
}

pub fn to_traditional(text: &str) -> String {
    map_chars(text, to_traditional_map())
}

pub fn to_simplified(text: &str) -> String {
    map_chars(text, to_simplified_map())
}

/// Convert between Chinese scripts locally.
///
/// Returns `None` unless both languages are simplified or traditional script.
/// Classical Chinese is a written register, not a script, so it is left to
/// the provider.
pub fn convert(text: &str, from: Language, to: Language) -> Option<String> {
    if !is_script(from) || !is_script(to) {
        return None;
    }

    let converted = match to {
        Language::SimplifiedChinese => to_simplified(text),
        _ => to_traditional(text),
    };
    Some(converted)
}

fn is_script(language: Language) -> bool {
    matches!(
        language,
        Language::SimplifiedChinese | Language::TraditionalChinese
    )
}
